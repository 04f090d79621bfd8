// Copyright (c) 2025 Huawei Technologies Co.,Ltd. All rights reserved.
//
// Argonc is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan
// PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//         http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY
// KIND, EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
// NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

use anyhow::{anyhow, bail, Result};
use nix::sched::CpuSet;

/// Bitmask form of a cpuset specification: bit i of byte i / 8 is set iff
/// CPU i is a member. The mask covers exactly up to the highest referenced
/// CPU index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuMask(Vec<u8>);

impl CpuMask {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_cpu_set(&self) -> Result<CpuSet> {
        let mut set = CpuSet::new();
        for (index, byte) in self.0.iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    set.set(index * 8 + bit)?;
                }
            }
        }
        Ok(set)
    }
}

fn parse_cpu_index(token: &str) -> Result<usize> {
    token
        .parse::<usize>()
        .map_err(|_| anyhow!("Invalid CPU index: {:?}", token))
}

/// Parse a cpuset specification like "0-2,7" into its bitmask form.
/// No partial mask is returned on a malformed token.
pub fn parse_cpuset(spec: &str) -> Result<CpuMask> {
    let mut cpus: Vec<usize> = Vec::new();

    for token in spec.split(',') {
        match token.split_once('-') {
            Some((first, last)) => {
                let first = parse_cpu_index(first)?;
                let last = parse_cpu_index(last)?;
                if first > last {
                    bail!("Invalid CPU range: {:?}", token);
                }
                cpus.extend(first..=last);
            }
            None => cpus.push(parse_cpu_index(token)?),
        }
    }

    let size = cpus.iter().max().map_or(0, |max| max / 8 + 1);
    let mut mask = vec![0u8; size];
    for cpu in cpus {
        mask[cpu / 8] |= 1 << (cpu % 8);
    }
    Ok(CpuMask(mask))
}

/// Return the prefix of `full_path` ending at the first path component equal
/// to `scope_name`. The scope name must match a whole component; a component
/// merely containing it does not count. Without any match the path is
/// returned unmodified.
pub fn resolve_scope_path(full_path: &str, scope_name: &str) -> String {
    let mut end = 0;

    for component in full_path.split('/') {
        end += component.len();
        if component == scope_name {
            return full_path[..end].to_string();
        }
        // Account for the separator.
        end += 1;
    }
    full_path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpuset() {
        assert_eq!(parse_cpuset("0").unwrap().as_bytes(), &[0x01]);
        assert_eq!(parse_cpuset("0-1").unwrap().as_bytes(), &[0x03]);
        assert_eq!(parse_cpuset("0,2").unwrap().as_bytes(), &[0x05]);
        assert_eq!(parse_cpuset("0-2").unwrap().as_bytes(), &[0x07]);
        assert_eq!(parse_cpuset("0,8").unwrap().as_bytes(), &[0x01, 0x01]);
        assert_eq!(parse_cpuset("0-2,4-6").unwrap().as_bytes(), &[0x77]);
    }

    #[test]
    fn test_parse_cpuset_malformed() {
        assert!(parse_cpuset("a").is_err());
        assert!(parse_cpuset("-1").is_err());
        assert!(parse_cpuset("0-").is_err());
        assert!(parse_cpuset("2-0").is_err());
        assert!(parse_cpuset("0,").is_err());
        assert!(parse_cpuset("").is_err());
        assert!(parse_cpuset("1-2-3").is_err());
    }

    #[test]
    fn test_cpu_mask_to_cpu_set() {
        let set = parse_cpuset("0,2,9").unwrap().to_cpu_set().unwrap();
        assert!(set.is_set(0).unwrap());
        assert!(!set.is_set(1).unwrap());
        assert!(set.is_set(2).unwrap());
        assert!(set.is_set(9).unwrap());
    }

    #[test]
    fn test_resolve_scope_path() {
        assert_eq!(
            resolve_scope_path("foo.scope", "foo.scope"),
            "foo.scope"
        );
        assert_eq!(
            resolve_scope_path("/foo/bar/user.slice/foo.scope/a/b/c", "foo.scope"),
            "/foo/bar/user.slice/foo.scope"
        );
        assert_eq!(
            resolve_scope_path("/foo/bar-foo.scope/user.slice/foo.scope/a/b/c", "foo.scope"),
            "/foo/bar-foo.scope/user.slice/foo.scope"
        );
        assert_eq!(
            resolve_scope_path("/foo/foo.scope-bar/user.slice/foo.scope/a/b/c", "foo.scope"),
            "/foo/foo.scope-bar/user.slice/foo.scope"
        );
        assert_eq!(
            resolve_scope_path("////foo.scope", "foo.scope"),
            "////foo.scope"
        );
    }

    #[test]
    fn test_resolve_scope_path_no_match() {
        assert_eq!(
            resolve_scope_path("/foo/bar-foo.scope/a", "foo.scope"),
            "/foo/bar-foo.scope/a"
        );
        assert_eq!(resolve_scope_path("", "foo.scope"), "");
    }
}
