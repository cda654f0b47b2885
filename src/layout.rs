//! Installation path layout.
//!
//! Every role is derived from a single install root through one of a few
//! anchors:
//!
//! ```text
//! root/Cellar/<name>/<version>   keg (versioned prefix)
//! root/opt/<name>                opt prefix (stable link to the keg)
//! root/etc                       shared configuration root
//! root/var                       shared state root
//! ```
//!
//! Roles that would otherwise repeat a path (`exec_prefix`, `sbindir`) are
//! aliases, so no two roles share a path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::util::{expand_vars, Vars};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("install root must be absolute: {0}")]
    RelativeRoot(PathBuf),
    #[error("role {role} refers to undefined role {base}")]
    UndefinedRole { role: String, base: String },
    #[error("roles {first} and {second} share the path {path}")]
    PathCollision {
        first: String,
        second: String,
        path: PathBuf,
    },
    #[error("duplicate role: {0}")]
    DuplicateRole(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    Root,
    Keg,
    Opt,
    Etc,
    Var,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Base {
    Anchor(Anchor),
    /// An earlier role or alias
    Role(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSpec {
    pub role: String,
    pub base: Base,
    /// Relative suffix; may use `{{qualifier}}`, `{{name}}`, `{{version}}`
    pub suffix: String,
    /// Written to the layout file consumed by configure
    pub in_layout_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutEntry {
    Role(RoleSpec),
    Alias { role: String, target: String },
}

impl LayoutEntry {
    pub fn anchored(role: &str, anchor: Anchor, suffix: &str) -> Self {
        LayoutEntry::Role(RoleSpec {
            role: role.to_string(),
            base: Base::Anchor(anchor),
            suffix: suffix.to_string(),
            in_layout_file: true,
        })
    }

    pub fn under(role: &str, base: &str, suffix: &str) -> Self {
        LayoutEntry::Role(RoleSpec {
            role: role.to_string(),
            base: Base::Role(base.to_string()),
            suffix: suffix.to_string(),
            in_layout_file: true,
        })
    }

    pub fn alias(role: &str, target: &str) -> Self {
        LayoutEntry::Alias {
            role: role.to_string(),
            target: target.to_string(),
        }
    }

    /// Keep this role out of the layout file.
    pub fn internal(self) -> Self {
        match self {
            LayoutEntry::Role(spec) => LayoutEntry::Role(RoleSpec {
                in_layout_file: false,
                ..spec
            }),
            alias => alias,
        }
    }

    fn role(&self) -> &str {
        match self {
            LayoutEntry::Role(spec) => &spec.role,
            LayoutEntry::Alias { role, .. } => role,
        }
    }
}

/// Declarative layout for one recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutSpec {
    /// Layout name as configure sees it (`--enable-layout=<name>`)
    pub name: String,
    pub entries: Vec<LayoutEntry>,
    /// File name of the rendered layout in the source tree
    pub file_name: Option<String>,
    /// Roles created before configure runs
    pub config_dirs: Vec<String>,
    /// Roles created after install (log, run state)
    pub state_dirs: Vec<String>,
    /// `(role, file)` pairs created if absent after install
    pub log_files: Vec<(String, String)>,
}

/// Package identity used to derive anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageId {
    pub name: String,
    pub version: String,
    /// Major-version segment that keeps variants apart (`2.4`)
    pub qualifier: String,
}

impl PackageId {
    /// Versioned install prefix under `root`.
    pub fn keg(&self, root: &Path) -> PathBuf {
        root.join("Cellar").join(&self.name).join(&self.version)
    }
}

/// Generated role → path mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathLayout {
    pub root: PathBuf,
    pub roles: Vec<(String, PathBuf)>,
    pub aliases: Vec<(String, String)>,
}

impl PathLayout {
    /// Path of a role or alias.
    pub fn get(&self, role: &str) -> Option<&Path> {
        let role = self
            .aliases
            .iter()
            .find(|(alias, _)| alias == role)
            .map(|(_, target)| target.as_str())
            .unwrap_or(role);
        self.roles
            .iter()
            .find(|(name, _)| name == role)
            .map(|(_, path)| path.as_path())
    }

    /// Template variables for every role and alias.
    pub fn vars(&self) -> Vars {
        let mut vars = Vars::new();
        for (role, path) in &self.roles {
            vars.insert(role.clone(), path.display().to_string());
        }
        for (alias, _) in &self.aliases {
            if let Some(path) = self.get(alias) {
                vars.insert(alias.clone(), path.display().to_string());
            }
        }
        vars
    }

    pub fn paths<'a>(&'a self, roles: &'a [String]) -> impl Iterator<Item = &'a Path> + 'a {
        roles.iter().filter_map(|r| self.get(r))
    }
}

fn anchor_path(anchor: Anchor, root: &Path, pkg: &PackageId) -> PathBuf {
    match anchor {
        Anchor::Root => root.to_path_buf(),
        Anchor::Keg => pkg.keg(root),
        Anchor::Opt => root.join("opt").join(&pkg.name),
        Anchor::Etc => root.join("etc"),
        Anchor::Var => root.join("var"),
    }
}

/// Derive every role path from `root`.
pub fn generate(
    spec: &LayoutSpec,
    root: &Path,
    pkg: &PackageId,
) -> Result<PathLayout, LayoutError> {
    if !root.is_absolute() {
        return Err(LayoutError::RelativeRoot(root.to_path_buf()));
    }

    let mut vars = Vars::new();
    vars.insert("name".to_string(), pkg.name.clone());
    vars.insert("version".to_string(), pkg.version.clone());
    vars.insert("qualifier".to_string(), pkg.qualifier.clone());

    let mut layout = PathLayout {
        root: root.to_path_buf(),
        roles: Vec::new(),
        aliases: Vec::new(),
    };

    for entry in &spec.entries {
        let name = entry.role();
        if layout.get(name).is_some() || layout.aliases.iter().any(|(a, _)| a == name) {
            return Err(LayoutError::DuplicateRole(name.to_string()));
        }

        match entry {
            LayoutEntry::Alias { role, target } => {
                if layout.get(target).is_none() {
                    return Err(LayoutError::UndefinedRole {
                        role: role.clone(),
                        base: target.clone(),
                    });
                }
                layout.aliases.push((role.clone(), target.clone()));
            }
            LayoutEntry::Role(spec) => {
                let base = match &spec.base {
                    Base::Anchor(anchor) => anchor_path(*anchor, root, pkg),
                    Base::Role(base) => layout
                        .get(base)
                        .map(Path::to_path_buf)
                        .ok_or_else(|| LayoutError::UndefinedRole {
                            role: spec.role.clone(),
                            base: base.clone(),
                        })?,
                };
                let suffix = expand_vars(&vars, &spec.suffix);
                let path = if suffix.is_empty() { base } else { base.join(suffix) };

                if let Some((other, _)) = layout.roles.iter().find(|(_, p)| *p == path) {
                    return Err(LayoutError::PathCollision {
                        first: other.clone(),
                        second: spec.role.clone(),
                        path,
                    });
                }
                layout.roles.push((spec.role.clone(), path));
            }
        }
    }

    tracing::debug!(roles = layout.roles.len(), root = %root.display(), "generated layout");
    Ok(layout)
}

/// Render the `<Layout name>` key-value file read by configure.
pub fn render_layout_file(spec: &LayoutSpec, layout: &PathLayout) -> String {
    let mut out = format!("<Layout {}>\n", spec.name);
    for entry in &spec.entries {
        let (role, value) = match entry {
            LayoutEntry::Alias { role, target } => (role, format!("${{{}}}", target)),
            LayoutEntry::Role(rs) if !rs.in_layout_file => continue,
            LayoutEntry::Role(rs) => {
                let value = match &rs.base {
                    Base::Role(base) if rs.suffix.is_empty() => format!("${{{}}}", base),
                    Base::Role(base) => format!("${{{}}}/{}", base, rs.suffix),
                    Base::Anchor(_) => layout
                        .get(&rs.role)
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                };
                (&rs.role, value)
            }
        };
        out.push_str(&format!("    {:<15}{}\n", format!("{}:", role), value));
    }
    out.push_str("</Layout>\n");
    out
}

/// Create the directories for `roles`. Existing directories are fine.
pub fn prepare_directories(layout: &PathLayout, roles: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for path in layout.paths(roles) {
        fs::create_dir_all(path)?;
        created.push(path.to_path_buf());
    }
    Ok(created)
}

/// Create log files that do not exist yet. Existing files are never
/// truncated. Returns the files that were created.
pub fn touch_log_files(
    layout: &PathLayout,
    files: &[(String, String)],
) -> io::Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for (role, file) in files {
        let Some(dir) = layout.get(role) else {
            continue;
        };
        fs::create_dir_all(dir)?;
        let path = dir.join(file);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => created.push(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}
