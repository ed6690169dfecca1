//! The solved dependency tree.

use std::fmt;
use std::sync::Arc;

use crate::package::{Package, PackageSet};

/// A solved tree: a package and the solutions underneath it.
///
/// The root's direct children are the runtime closure (flat leaves) plus
/// one subtree per development dependency; a development subtree holds the
/// packages private to that dependency.
#[derive(Debug, Clone)]
pub struct Solution {
    pub root: Arc<Package>,
    pub children: Vec<Solution>,
}

impl Solution {
    pub fn new(root: Arc<Package>, children: Vec<Solution>) -> Solution {
        Solution { root, children }
    }

    pub fn leaf(root: Arc<Package>) -> Solution {
        Solution {
            root,
            children: Vec::new(),
        }
    }

    /// The direct child solution rooted at `name`, if any.
    pub fn child(&self, name: &str) -> Option<&Solution> {
        self.children.iter().find(|child| child.root.name == name)
    }

    /// Every package in the tree, excluding this solution's own root.
    pub fn package_set(&self) -> PackageSet {
        let mut set = PackageSet::new();
        for child in &self.children {
            set.insert(child.root.id(), child.root.clone());
            set.extend(child.package_set());
        }
        set
    }

    /// The packages in this tree satisfying `package`'s declared runtime
    /// requirements, one per requirement the tree can answer.
    pub fn dependencies_of(&self, package: &Package) -> Vec<Arc<Package>> {
        let set = self.package_set();
        package
            .dependencies
            .iter()
            .filter_map(|req| {
                set.values()
                    .find(|p| p.name == req.name() && req.spec().matches(&p.version))
                    .cloned()
            })
            .collect()
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.root, indent = depth * 2)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Req;
    use keel_version::Version;

    fn pkg(name: &str, version: &str) -> Arc<Package> {
        Arc::new(Package::new(name, Version::parse(version).unwrap()))
    }

    fn sample() -> Solution {
        Solution::new(
            pkg("app", "1.0.0"),
            vec![
                Solution::leaf(pkg("a", "1.0.0")),
                Solution::new(
                    pkg("test-runner", "2.0.0"),
                    vec![Solution::leaf(pkg("b", "3.0.0"))],
                ),
            ],
        )
    }

    #[test]
    fn test_child_lookup() {
        let solution = sample();
        assert!(solution.child("test-runner").is_some());
        assert!(solution.child("b").is_none());
    }

    #[test]
    fn test_package_set_excludes_root() {
        let solution = sample();
        let set = solution.package_set();
        assert_eq!(set.len(), 3);
        assert!(!set.contains_key(&pkg("app", "1.0.0").id()));
        assert!(set.contains_key(&pkg("b", "3.0.0").id()));
    }

    #[test]
    fn test_dependencies_of_resolves_from_tree() {
        let runner = Arc::new(
            Package::new("test-runner", Version::parse("2.0.0").unwrap())
                .with_dependencies(vec![Req::parse("b@^3").unwrap()]),
        );
        let solution = Solution::new(
            pkg("app", "1.0.0"),
            vec![Solution::new(
                runner.clone(),
                vec![Solution::leaf(pkg("b", "3.0.0"))],
            )],
        );

        let resolved = solution.dependencies_of(&runner);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].to_string(), "b@3.0.0");

        // A requirement nothing in the tree satisfies resolves to nothing.
        let stray = Package::new("x", Version::parse("1.0.0").unwrap())
            .with_dependencies(vec![Req::parse("ghost@^1").unwrap()]);
        assert!(solution.dependencies_of(&stray).is_empty());
    }

    #[test]
    fn test_display_is_indented() {
        let rendered = sample().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "app@1.0.0");
        assert_eq!(lines[1], "  a@1.0.0");
        assert_eq!(lines[3], "    b@3.0.0");
    }
}
