//! Authentication
//!
//! Two mutually exclusive modes, selected by whether a search filter
//! is configured. Bind mode constructs a DN from the username and
//! binds it directly. Search mode authenticates the connection (with
//! the service account or anonymously), locates exactly one entry, and
//! binds that entry's DN. Anything other than exactly one entry is a
//! failure.

use crate::connection::DirectoryOps;
use crate::filter::render_search_filter;
use bawwab_core::config::DirectoryConfig;
use bawwab_core::types::{Credentials, DirectoryIdentity};
use bawwab_core::{Error, Result};
use ldap3::{dn_escape, Scope};
use tracing::debug;

/// Attributes requested when locating a user in search mode.
const SEARCH_ATTRS: [&str; 2] = ["dn", "cn"];

/// Validate credentials against the directory.
///
/// Empty passwords are rejected before any directory contact: an
/// unauthenticated bind would otherwise succeed and look like a valid
/// login.
pub async fn authenticate(
    ops: &mut dyn DirectoryOps,
    config: &DirectoryConfig,
    credentials: &Credentials,
) -> Result<DirectoryIdentity> {
    if credentials.password.is_empty() {
        return Err(Error::EmptyPassword);
    }

    if config.search_mode() {
        search_and_bind(ops, config, credentials).await
    } else {
        bind_direct(ops, config, credentials).await
    }
}

async fn bind_direct(
    ops: &mut dyn DirectoryOps,
    config: &DirectoryConfig,
    credentials: &Credentials,
) -> Result<DirectoryIdentity> {
    let dn = format!(
        "{}={},{}",
        config.attribute,
        dn_escape(&credentials.username),
        config.base_dn
    );
    debug!("binding directly as {}", dn);

    ops.simple_bind(&dn, &credentials.password).await?;
    Ok(DirectoryIdentity::from_dn(dn))
}

async fn search_and_bind(
    ops: &mut dyn DirectoryOps,
    config: &DirectoryConfig,
    credentials: &Credentials,
) -> Result<DirectoryIdentity> {
    if !config.bind_dn.is_empty() && !config.bind_password.is_empty() {
        debug!("binding service account {}", config.bind_dn);
        ops.simple_bind(&config.bind_dn, &config.bind_password)
            .await?;
    } else {
        debug!("anonymous bind for user search");
        ops.simple_bind("", "").await?;
    }

    let filter = render_search_filter(config, &credentials.username);
    debug!("searching {} with filter {}", config.base_dn, filter);

    let mut entries = ops
        .search(&config.base_dn, Scope::Subtree, &filter, &SEARCH_ATTRS)
        .await?;

    if entries.len() > 1 {
        return Err(Error::SearchAmbiguous(entries.len()));
    }
    let entry = entries.pop().ok_or(Error::SearchEmpty)?;

    debug!("found user dn {}", entry.dn);
    ops.simple_bind(&entry.dn, &credentials.password).await?;

    Ok(DirectoryIdentity {
        dn: entry.dn,
        attributes: entry.attrs,
    })
}
