//! Scripted directory stand-in for decision-logic tests.

use crate::connection::DirectoryOps;
use async_trait::async_trait;
use bawwab_core::{Error, Result};
use ldap3::{Scope, SearchEntry};
use std::collections::{HashMap, VecDeque};

/// Records every bind and search, rejecting scripted DNs and replaying
/// canned search results in order. Searches beyond the script return
/// no entries.
#[derive(Default)]
pub(crate) struct ScriptedOps {
    pub binds: Vec<(String, String)>,
    /// (base, scope, filter) per search call
    pub searches: Vec<(String, String, String)>,
    pub reject_binds: Vec<String>,
    pub search_results: VecDeque<Result<Vec<SearchEntry>>>,
}

impl ScriptedOps {
    pub fn entry(dn: &str) -> SearchEntry {
        SearchEntry {
            dn: dn.to_string(),
            attrs: HashMap::new(),
            bin_attrs: HashMap::new(),
        }
    }

    pub fn entry_with(dn: &str, attr: &str, values: &[&str]) -> SearchEntry {
        let mut attrs = HashMap::new();
        attrs.insert(
            attr.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        SearchEntry {
            dn: dn.to_string(),
            attrs,
            bin_attrs: HashMap::new(),
        }
    }
}

#[async_trait]
impl DirectoryOps for ScriptedOps {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        self.binds.push((dn.to_string(), password.to_string()));
        if self.reject_binds.iter().any(|rejected| rejected == dn) {
            return Err(Error::BindFailed(
                "result code 49: invalid credentials".to_string(),
            ));
        }
        Ok(())
    }

    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        _attrs: &[&str],
    ) -> Result<Vec<SearchEntry>> {
        self.searches
            .push((base.to_string(), format!("{:?}", scope), filter.to_string()));
        self.search_results
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
