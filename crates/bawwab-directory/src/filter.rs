//! Search filter construction
//!
//! Filters are assembled by explicit substitution, never by a template
//! engine. Every user-controlled value is escaped before it reaches a
//! filter.

use bawwab_core::config::DirectoryConfig;
use ldap3::ldap_escape;

/// Matching rule OID for transitive group membership, understood by
/// Active Directory.
pub const NESTED_MATCHING_RULE: &str = "1.2.840.113556.1.4.1941";

/// Render the configured user search filter.
///
/// `{attribute}` expands to the configured naming attribute and
/// `{username}` to the escaped request username. The attribute is
/// substituted first so braces inside an escaped username stay
/// literal.
pub fn render_search_filter(config: &DirectoryConfig, username: &str) -> String {
    config
        .search_filter
        .replace("{attribute}", &config.attribute)
        .replace("{username}", &ldap_escape(username))
}

/// Build the group membership filter for one authorization check.
///
/// Matches the user by DN (groupOfNames and groupOfUniqueNames) and by
/// username (posixGroup). When `nested` is set an extra clause matches
/// membership transitively through nested groups.
pub fn group_filter(user_dn: &str, username: &str, nested: bool) -> String {
    let dn = ldap_escape(user_dn);
    let user = ldap_escape(username);

    let mut filter = format!("(|(member={})(uniqueMember={})(memberUid={})", dn, dn, user);
    if nested {
        filter.push_str(&format!("(member:{}:={})", NESTED_MATCHING_RULE, dn));
    }
    filter.push(')');
    filter
}
