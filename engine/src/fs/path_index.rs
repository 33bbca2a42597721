//! Reactive path index (§4.5): fully rebuilt from the files table on every
//! change. The table is expected to be small enough that an O(n) rebuild on
//! each mutation is cheap, the same tradeoff the teacher's in-memory
//! `Memory` engine makes by keeping its whole keyspace in a `BTreeMap`.

use std::collections::HashMap;

use super::files_table::FileRow;

const MAX_DEPTH: usize = 50;

#[derive(Debug, Default, Clone)]
pub struct PathIndex {
    path_to_id: HashMap<String, String>,
    id_to_path: HashMap<String, String>,
    children_of: HashMap<Option<String>, Vec<String>>,
    /// Disambiguated display name per id, computed during rebuild.
    display_name: HashMap<String, String>,
}

impl PathIndex {
    pub fn lookup_id(&self, path: &str) -> Option<&String> {
        self.path_to_id.get(path)
    }

    pub fn path_for_id(&self, id: &str) -> Option<&String> {
        self.id_to_path.get(id)
    }

    pub fn children_of(&self, parent_id: Option<&str>) -> &[String] {
        self.children_of
            .get(&parent_id.map(|s| s.to_string()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Rebuilds the index from scratch. Returns the set of file ids whose
    /// `parentId` was corrected (cycle break or orphan re-parenting) so the
    /// caller can write the correction back to the files table.
    pub fn rebuild(&mut self, rows: &[FileRow]) -> Vec<(String, CorrectionReason)> {
        let mut by_id: HashMap<String, FileRow> = rows.iter().cloned().map(|r| (r.id.clone(), r)).collect();
        let mut corrections = Vec::new();

        // Step 1: break cycles. Walk each node's parent chain; if we
        // revisit a node already on the current walk, the whole walked
        // chain is a cycle (a self-parenting row is a 1-element cycle).
        // Pick the greatest (updatedAt, id) among the cycle members and cut
        // its parent link.
        let ids: Vec<String> = by_id.keys().cloned().collect();
        for start in &ids {
            let Some(cycle) = find_cycle(&by_id, start) else { continue };
            let winner = cycle
                .iter()
                .max_by(|a, b| {
                    let ra = &by_id[*a];
                    let rb = &by_id[*b];
                    (ra.updated_at, &ra.id).cmp(&(rb.updated_at, &rb.id))
                })
                .unwrap()
                .clone();
            if let Some(row) = by_id.get_mut(&winner) {
                if row.parent_id.is_some() {
                    row.parent_id = None;
                    corrections.push((winner, CorrectionReason::CycleBroken));
                }
            }
        }

        // Step 2: re-parent orphans (parentId points at a missing/trashed row).
        let valid_ids: std::collections::HashSet<String> = by_id.keys().cloned().collect();
        for row in by_id.values_mut() {
            if let Some(parent) = &row.parent_id {
                if !valid_ids.contains(parent) {
                    row.parent_id = None;
                    corrections.push((row.id.clone(), CorrectionReason::OrphanRescued));
                }
            }
        }

        // Step 3: group children by parent.
        let mut children_of: HashMap<Option<String>, Vec<String>> = HashMap::new();
        for row in by_id.values() {
            children_of.entry(row.parent_id.clone()).or_default().push(row.id.clone());
        }

        // Step 4: disambiguate names within each parent bucket, earliest
        // (createdAt, id) keeps the bare name.
        let mut display_name = HashMap::new();
        for siblings in children_of.values_mut() {
            siblings.sort_by(|a, b| {
                let ra = &by_id[a];
                let rb = &by_id[b];
                (ra.created_at, &ra.id).cmp(&(rb.created_at, &rb.id))
            });
            let mut seen: HashMap<String, u32> = HashMap::new();
            for id in siblings.iter() {
                let row = &by_id[id];
                let count = seen.entry(row.name.clone()).or_insert(0);
                let name = if *count == 0 {
                    row.name.clone()
                } else {
                    disambiguate(&row.name, *count)
                };
                *count += 1;
                display_name.insert(id.clone(), name);
            }
        }

        // Step 5: compute full paths by walking ancestors, capped at
        // MAX_DEPTH (deeper chains are treated as cycles and rooted).
        let mut path_to_id = HashMap::new();
        let mut id_to_path = HashMap::new();
        for id in by_id.keys() {
            let mut parts = Vec::new();
            let mut current = Some(id.clone());
            let mut depth = 0;
            while let Some(cur) = current {
                if depth >= MAX_DEPTH {
                    parts.clear();
                    break;
                }
                let Some(name) = display_name.get(&cur) else { break };
                parts.push(name.clone());
                current = by_id.get(&cur).and_then(|r| r.parent_id.clone());
                depth += 1;
            }
            parts.reverse();
            let path = format!("/{}", parts.join("/"));
            path_to_id.insert(path.clone(), id.clone());
            id_to_path.insert(id.clone(), path);
        }

        self.path_to_id = path_to_id;
        self.id_to_path = id_to_path;
        self.children_of = children_of;
        self.display_name = display_name;
        corrections
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionReason {
    CycleBroken,
    OrphanRescued,
}

fn find_cycle(by_id: &HashMap<String, FileRow>, start: &str) -> Option<Vec<String>> {
    let mut path = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut current = Some(start.to_string());
    while let Some(id) = current {
        if seen.contains(&id) {
            let cycle_start = path.iter().position(|p| p == &id).unwrap_or(0);
            return Some(path[cycle_start..].to_vec());
        }
        seen.insert(id.clone());
        path.push(id.clone());
        current = by_id.get(&id).and_then(|r| r.parent_id.clone());
    }
    None
}

fn disambiguate(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({}){}", &name[..dot], n, &name[dot..]),
        _ => format!("{name} ({n})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, name: &str, parent: Option<&str>, created_at: i64, updated_at: i64) -> FileRow {
        FileRow {
            id: id.to_string(),
            name: name.to_string(),
            parent_id: parent.map(|s| s.to_string()),
            kind: super::super::files_table::FileKind::File,
            size: 0,
            created_at,
            updated_at,
            trashed_at: None,
        }
    }

    #[test]
    fn builds_simple_paths() {
        let mut idx = PathIndex::default();
        let rows = vec![row("root", "root", None, 0, 0), row("a", "a.txt", Some("root"), 1, 1)];
        idx.rebuild(&rows);
        assert_eq!(idx.lookup_id("/root/a.txt"), Some(&"a".to_string()));
    }

    #[test]
    fn orphan_is_reparented_to_root() {
        let mut idx = PathIndex::default();
        let rows = vec![row("a", "a.txt", Some("missing"), 0, 0)];
        let corrections = idx.rebuild(&rows);
        assert_eq!(corrections, vec![("a".to_string(), CorrectionReason::OrphanRescued)]);
        assert_eq!(idx.lookup_id("/a.txt"), Some(&"a".to_string()));
    }

    #[test]
    fn cycle_is_broken_keeping_greatest_updated_at() {
        let mut idx = PathIndex::default();
        let rows = vec![row("a", "a", Some("b"), 0, 1), row("b", "b", Some("a"), 0, 2)];
        let corrections = idx.rebuild(&rows);
        assert_eq!(corrections, vec![("b".to_string(), CorrectionReason::CycleBroken)]);
    }

    #[test]
    fn self_parent_is_broken_as_a_one_element_cycle() {
        let mut idx = PathIndex::default();
        let rows = vec![row("a", "a", Some("a"), 0, 0)];
        let corrections = idx.rebuild(&rows);
        assert_eq!(corrections, vec![("a".to_string(), CorrectionReason::CycleBroken)]);
        assert_eq!(idx.lookup_id("/a"), Some(&"a".to_string()));
    }

    #[test]
    fn duplicate_names_are_disambiguated() {
        let mut idx = PathIndex::default();
        let rows = vec![
            row("a", "note.txt", None, 0, 0),
            row("b", "note.txt", None, 1, 1),
        ];
        idx.rebuild(&rows);
        assert_eq!(idx.lookup_id("/note.txt"), Some(&"a".to_string()));
        assert_eq!(idx.lookup_id("/note (1).txt"), Some(&"b".to_string()));
    }
}
