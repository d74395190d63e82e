use std::path::PathBuf;

use anyhow::{bail, Context};
use serde_json::json;

use crate::sections::{SectionPolicy, DEFAULT_SECTION_CAPACITY};
use crate::store::Repository;

pub const ENV_LOG: &str = "SCHOOLD_LOG";
pub const ENV_WORKSPACE: &str = "SCHOOLD_WORKSPACE";
pub const ENV_SECTION_CAPACITY: &str = "SCHOOLD_SECTION_CAPACITY";
pub const ENV_ROOM_POOL: &str = "SCHOOLD_ROOM_POOL";
pub const ENV_MAX_SECTIONS: &str = "SCHOOLD_MAX_SECTIONS";

pub const KEY_CAPACITY: &str = "sections.capacity";
pub const KEY_ROOM_POOL: &str = "sections.roomPool";
pub const KEY_MAX_SECTIONS: &str = "sections.maxSections";

/// Process-level defaults. Workspace settings override the section policy.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub sections: SectionPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let capacity = match get(ENV_SECTION_CAPACITY) {
            Some(v) => parse_capacity(&v).with_context(|| format!("{ENV_SECTION_CAPACITY}={v}"))?,
            None => DEFAULT_SECTION_CAPACITY,
        };
        let room_pool = get(ENV_ROOM_POOL)
            .map(|v| {
                v.split(',')
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let max_sections = match get(ENV_MAX_SECTIONS) {
            Some(v) => Some(
                parse_capacity(&v).with_context(|| format!("{ENV_MAX_SECTIONS}={v}"))?,
            ),
            None => None,
        };

        Ok(Config {
            workspace: get(ENV_WORKSPACE).map(PathBuf::from),
            sections: SectionPolicy {
                capacity,
                room_pool,
                max_sections,
            },
        })
    }
}

fn parse_capacity(raw: &str) -> anyhow::Result<usize> {
    let n: usize = raw.parse().context("expected a positive integer")?;
    if n == 0 {
        bail!("must be at least 1");
    }
    Ok(n)
}

/// Section policy for the open workspace: stored settings over `defaults`.
pub fn effective_policy(
    repo: &dyn Repository,
    defaults: &SectionPolicy,
) -> anyhow::Result<SectionPolicy> {
    let mut policy = defaults.clone();
    if let Some(v) = repo.get_setting(KEY_CAPACITY)? {
        policy.capacity = v
            .as_u64()
            .filter(|n| *n > 0)
            .with_context(|| format!("{KEY_CAPACITY} must be a positive integer, got {v}"))?
            as usize;
    }
    if let Some(v) = repo.get_setting(KEY_ROOM_POOL)? {
        policy.room_pool = serde_json::from_value(v)
            .with_context(|| format!("{KEY_ROOM_POOL} must be an array of strings"))?;
    }
    if let Some(v) = repo.get_setting(KEY_MAX_SECTIONS)? {
        policy.max_sections = if v.is_null() {
            None
        } else {
            Some(
                v.as_u64()
                    .filter(|n| *n > 0)
                    .with_context(|| format!("{KEY_MAX_SECTIONS} must be a positive integer or null"))?
                    as usize,
            )
        };
    }
    Ok(policy)
}

pub fn store_policy(repo: &mut dyn Repository, policy: &SectionPolicy) -> anyhow::Result<()> {
    repo.put_setting(KEY_CAPACITY, &json!(policy.capacity))?;
    repo.put_setting(KEY_ROOM_POOL, &json!(policy.room_pool))?;
    repo.put_setting(KEY_MAX_SECTIONS, &json!(policy.max_sections))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = Config::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg.sections.capacity, 30);
        assert!(cfg.sections.room_pool.is_empty());
        assert_eq!(cfg.sections.max_sections, None);
        assert_eq!(cfg.workspace, None);
    }

    #[test]
    fn env_overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            (ENV_SECTION_CAPACITY, " 25 "),
            (ENV_ROOM_POOL, "101, 102,,Lab"),
            (ENV_MAX_SECTIONS, "4"),
            (ENV_WORKSPACE, "/tmp/ws"),
        ]))
        .expect("config");
        assert_eq!(cfg.sections.capacity, 25);
        assert_eq!(cfg.sections.room_pool, vec!["101", "102", "Lab"]);
        assert_eq!(cfg.sections.max_sections, Some(4));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ws")));
    }

    #[test]
    fn zero_or_garbage_capacity_is_rejected() {
        assert!(Config::from_lookup(lookup(&[(ENV_SECTION_CAPACITY, "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[(ENV_SECTION_CAPACITY, "lots")])).is_err());
    }

    #[test]
    fn workspace_settings_override_defaults() {
        let mut repo = MemoryStore::new();
        let defaults = SectionPolicy::default();
        assert_eq!(effective_policy(&repo, &defaults).expect("policy"), defaults);

        let stored = SectionPolicy {
            capacity: 2,
            room_pool: vec!["R1".into()],
            max_sections: Some(3),
        };
        store_policy(&mut repo, &stored).expect("store");
        assert_eq!(effective_policy(&repo, &defaults).expect("policy"), stored);

        repo.put_setting(KEY_MAX_SECTIONS, &serde_json::Value::Null)
            .expect("put");
        assert_eq!(
            effective_policy(&repo, &defaults)
                .expect("policy")
                .max_sections,
            None
        );
    }

    #[test]
    fn bad_stored_capacity_is_an_error() {
        let mut repo = MemoryStore::new();
        repo.put_setting(KEY_CAPACITY, &json!(0)).expect("put");
        assert!(effective_policy(&repo, &SectionPolicy::default()).is_err());
    }
}
