//! CUDF text printing and solution parsing.

use std::fmt;

use thiserror::Error;

use super::{CudfConstraint, CudfDocument, CudfPackage};

fn write_constraint(f: &mut fmt::Formatter<'_>, c: &CudfConstraint) -> fmt::Result {
    match c.constraint {
        None => f.write_str(&c.name),
        Some((op, version)) => write!(f, "{} {} {}", c.name, op.as_str(), version),
    }
}

fn write_constraint_list(f: &mut fmt::Formatter<'_>, list: &[CudfConstraint], sep: &str) -> fmt::Result {
    for (i, c) in list.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write_constraint(f, c)?;
    }
    Ok(())
}

impl fmt::Display for CudfPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "package: {}", self.name)?;
        writeln!(f, "version: {}", self.version)?;
        if !self.depends.is_empty() {
            f.write_str("depends: ")?;
            for (i, disjunction) in self.depends.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_constraint_list(f, disjunction, " | ")?;
            }
            f.write_str("\n")?;
        }
        if !self.conflicts.is_empty() {
            f.write_str("conflicts: ")?;
            write_constraint_list(f, &self.conflicts, ", ")?;
            f.write_str("\n")?;
        }
        if self.installed {
            writeln!(f, "installed: true")?;
        }
        if self.keep {
            writeln!(f, "keep: version")?;
        }
        Ok(())
    }
}

impl fmt::Display for CudfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "preamble:")?;
        writeln!(f)?;
        for package in &self.packages {
            write!(f, "{}", package)?;
            writeln!(f)?;
        }
        writeln!(f, "request:")?;
        if !self.request.install.is_empty() {
            f.write_str("install: ")?;
            write_constraint_list(f, &self.request.install, ", ")?;
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum SolutionParseError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("solution contains no package stanzas")]
    Empty,
}

/// Parse the solution document printed by the external solver.
///
/// Returns the `(name, version)` pairs of every stanza marked
/// `installed: true`. Unknown fields are skipped; a stanza without a version
/// or a non-numeric version is an error. A document with no package stanzas
/// at all (e.g. the solver printed `FAIL`) parses as [`SolutionParseError::Empty`],
/// which callers treat as an unsatisfiability verdict.
pub fn parse_solution(text: &str) -> Result<Vec<(String, u32)>, SolutionParseError> {
    let mut installed = Vec::new();
    let mut saw_stanza = false;

    let mut current_name: Option<String> = None;
    let mut current_version: Option<u32> = None;
    let mut current_installed = false;

    let mut finish = |name: &mut Option<String>,
                      version: &mut Option<u32>,
                      is_installed: &mut bool,
                      line: usize|
     -> Result<(), SolutionParseError> {
        if let Some(name) = name.take() {
            let version = version.take().ok_or_else(|| SolutionParseError::Malformed {
                line,
                reason: format!("package {} has no version", name),
            })?;
            if *is_installed {
                installed.push((name, version));
            }
        }
        *version = None;
        *is_installed = false;
        Ok(())
    };

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim_end();
        if line.is_empty() {
            finish(&mut current_name, &mut current_version, &mut current_installed, idx + 1)?;
            continue;
        }

        let Some((field, value)) = line.split_once(':') else {
            // Informational output such as a FAIL marker.
            continue;
        };
        let value = value.trim();

        match field.trim() {
            "package" => {
                finish(&mut current_name, &mut current_version, &mut current_installed, idx + 1)?;
                saw_stanza = true;
                current_name = Some(value.to_string());
            }
            "version" => {
                current_version =
                    Some(value.parse().map_err(|_| SolutionParseError::Malformed {
                        line: idx + 1,
                        reason: format!("bad version \"{}\"", value),
                    })?);
            }
            "installed" => {
                current_installed = value == "true";
            }
            _ => {}
        }
    }
    let last = text.lines().count();
    finish(&mut current_name, &mut current_version, &mut current_installed, last)?;

    if !saw_stanza {
        return Err(SolutionParseError::Empty);
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cudf::{CudfRequest, RelOp};

    #[test]
    fn test_print_document() {
        let mut a1 = CudfPackage::new("a", 1);
        a1.depends = vec![vec![
            CudfConstraint::exact("b", 1),
            CudfConstraint::exact("b", 2),
        ]];
        a1.conflicts = vec![CudfConstraint::any("a")];

        let mut b2 = CudfPackage::new("b", 2);
        b2.conflicts = vec![CudfConstraint::any("b")];
        b2.installed = true;
        b2.keep = true;

        let doc = CudfDocument {
            packages: vec![a1, b2],
            request: CudfRequest {
                install: vec![CudfConstraint::exact("a", 1)],
            },
        };

        let text = doc.to_string();
        let expected = "\
preamble:

package: a
version: 1
depends: b = 1 | b = 2
conflicts: a

package: b
version: 2
conflicts: b
installed: true
keep: version

request:
install: a = 1
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_print_relops() {
        let mut p = CudfPackage::new("p", 1);
        p.depends = vec![vec![CudfConstraint {
            name: "q".to_string(),
            constraint: Some((RelOp::Geq, 3)),
        }]];
        assert!(p.to_string().contains("depends: q >= 3"));
    }

    #[test]
    fn test_parse_solution() {
        let text = "\
package: a
version: 1
installed: true

package: b
version: 2
installed: true

package: c
version: 1
installed: false
";
        let installed = parse_solution(text).unwrap();
        assert_eq!(
            installed,
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );
    }

    #[test]
    fn test_parse_solution_without_trailing_newline() {
        let text = "package: a\nversion: 3\ninstalled: true";
        assert_eq!(parse_solution(text).unwrap(), vec![("a".to_string(), 3)]);
    }

    #[test]
    fn test_parse_fail_output() {
        assert!(matches!(parse_solution("FAIL\n"), Err(SolutionParseError::Empty)));
        assert!(matches!(parse_solution(""), Err(SolutionParseError::Empty)));
    }

    #[test]
    fn test_parse_missing_version() {
        let text = "package: a\ninstalled: true\n";
        assert!(matches!(
            parse_solution(text),
            Err(SolutionParseError::Malformed { .. })
        ));
    }

    #[test]
    fn test_round_trip_through_parser() {
        let mut a = CudfPackage::new("a", 1);
        a.installed = true;
        let doc = CudfDocument {
            packages: vec![a, CudfPackage::new("b", 4)],
            request: CudfRequest::default(),
        };
        assert_eq!(parse_solution(&doc.to_string()).unwrap(), vec![("a".to_string(), 1)]);
    }
}
