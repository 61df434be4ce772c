//! Authorization
//!
//! Allow-list evaluation for an authenticated identity. Empty lists
//! grant everyone (authentication-only deployments). Otherwise the
//! user list is checked first, then each allowed group is probed with
//! a base-scope membership search; the first matching group wins.
//! Search errors do not abort the loop, but the last one is kept and
//! chained into the final denial.

use crate::connection::DirectoryOps;
use crate::filter::group_filter;
use bawwab_core::config::AccessConfig;
use bawwab_core::types::{Credentials, DirectoryIdentity};
use bawwab_core::{Error, Result};
use ldap3::Scope;
use tracing::{debug, warn};

pub async fn authorize(
    ops: &mut dyn DirectoryOps,
    access: &AccessConfig,
    identity: &DirectoryIdentity,
    credentials: &Credentials,
) -> Result<()> {
    if access.allowed_users.is_empty() && access.allowed_groups.is_empty() {
        return Ok(());
    }

    let dn_lc = identity.dn.to_lowercase();
    for allowed in &access.allowed_users {
        let allowed_lc = allowed.to_lowercase();
        if allowed_lc == credentials.username_lc || allowed_lc == dn_lc {
            debug!("user {} allowed by user list", credentials.username_lc);
            return Ok(());
        }
    }

    let filter = group_filter(&identity.dn, &credentials.username, access.nested_groups);
    let mut last_error = None;

    for group in &access.allowed_groups {
        debug!("checking membership in {} with filter {}", group, filter);
        match ops.search(group, Scope::Base, &filter, &["cn"]).await {
            Ok(entries) if !entries.is_empty() => {
                debug!(
                    "user {} allowed by group {}",
                    credentials.username_lc, group
                );
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => {
                warn!("membership check failed for {}: {}", group, e);
                last_error = Some(e);
            }
        }
    }

    Err(Error::NotAuthorized {
        username: credentials.username_lc.clone(),
        source: last_error.map(Box::new),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedOps;

    fn identity(dn: &str) -> DirectoryIdentity {
        DirectoryIdentity::from_dn(dn.to_string())
    }

    fn credentials(username: &str) -> Credentials {
        Credentials::new(username.to_string(), "pw".to_string())
    }

    fn access(users: &[&str], groups: &[&str]) -> AccessConfig {
        AccessConfig {
            allowed_users: users.iter().map(|u| u.to_string()).collect(),
            allowed_groups: groups.iter().map(|g| g.to_string()).collect(),
            nested_groups: false,
        }
    }

    #[tokio::test]
    async fn test_empty_lists_grant_everyone() {
        let mut ops = ScriptedOps::default();
        authorize(
            &mut ops,
            &access(&[], &[]),
            &identity("cn=a,dc=example,dc=org"),
            &credentials("a"),
        )
        .await
        .unwrap();
        assert!(ops.searches.is_empty());
    }

    #[tokio::test]
    async fn test_user_list_match_is_case_insensitive() {
        let mut ops = ScriptedOps::default();
        authorize(
            &mut ops,
            &access(&["ALICE"], &[]),
            &identity("cn=alice,dc=example,dc=org"),
            &credentials("Alice"),
        )
        .await
        .unwrap();
        assert!(ops.searches.is_empty());
    }

    #[tokio::test]
    async fn test_user_list_matches_identity_dn() {
        let mut ops = ScriptedOps::default();
        authorize(
            &mut ops,
            &access(&["CN=Alice,DC=Example,DC=Org"], &[]),
            &identity("cn=alice,dc=example,dc=org"),
            &credentials("alice"),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_first_matching_group_short_circuits() {
        let mut ops = ScriptedOps::default();
        ops.search_results
            .push_back(Ok(vec![ScriptedOps::entry("cn=admins,dc=example,dc=org")]));

        authorize(
            &mut ops,
            &access(
                &[],
                &["cn=admins,dc=example,dc=org", "cn=devs,dc=example,dc=org"],
            ),
            &identity("cn=bob,dc=example,dc=org"),
            &credentials("bob"),
        )
        .await
        .unwrap();

        assert_eq!(ops.searches.len(), 1);
        assert_eq!(ops.searches[0].0, "cn=admins,dc=example,dc=org");
        assert_eq!(ops.searches[0].1, "Base");
    }

    #[tokio::test]
    async fn test_later_group_can_still_match() {
        let mut ops = ScriptedOps::default();
        ops.search_results.push_back(Ok(Vec::new()));
        ops.search_results
            .push_back(Ok(vec![ScriptedOps::entry("cn=devs,dc=example,dc=org")]));

        authorize(
            &mut ops,
            &access(
                &[],
                &["cn=admins,dc=example,dc=org", "cn=devs,dc=example,dc=org"],
            ),
            &identity("cn=bob,dc=example,dc=org"),
            &credentials("bob"),
        )
        .await
        .unwrap();
        assert_eq!(ops.searches.len(), 2);
    }

    #[tokio::test]
    async fn test_no_match_denies_with_username() {
        let mut ops = ScriptedOps::default();
        ops.search_results.push_back(Ok(Vec::new()));

        let err = authorize(
            &mut ops,
            &access(&[], &["cn=admins,dc=example,dc=org"]),
            &identity("cn=bob,dc=example,dc=org"),
            &credentials("Bob"),
        )
        .await
        .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("bob"));
        assert!(text.contains("does not match any allowed users nor allowed groups"));
    }

    #[tokio::test]
    async fn test_search_error_does_not_abort_loop_and_is_chained() {
        let mut ops = ScriptedOps::default();
        ops.search_results
            .push_back(Err(Error::SearchFailed("no such object".to_string())));
        ops.search_results.push_back(Ok(Vec::new()));

        let err = authorize(
            &mut ops,
            &access(
                &[],
                &["cn=gone,dc=example,dc=org", "cn=devs,dc=example,dc=org"],
            ),
            &identity("cn=bob,dc=example,dc=org"),
            &credentials("bob"),
        )
        .await
        .unwrap_err();

        assert_eq!(ops.searches.len(), 2);
        let reason = err.reason();
        assert!(reason.contains("does not match any allowed users"));
        assert!(reason.contains("no such object"));
    }

    #[tokio::test]
    async fn test_membership_filter_carries_dn_and_username() {
        let mut ops = ScriptedOps::default();
        ops.search_results.push_back(Ok(Vec::new()));

        let _ = authorize(
            &mut ops,
            &access(&[], &["cn=admins,dc=example,dc=org"]),
            &identity("cn=bob,dc=example,dc=org"),
            &credentials("bob"),
        )
        .await;

        let filter = &ops.searches[0].2;
        assert!(filter.contains("(member=cn=bob,dc=example,dc=org)"));
        assert!(filter.contains("(memberUid=bob)"));
    }
}
