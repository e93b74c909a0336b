use std::{
    fmt::Display,
    hash::Hash,
    path::{Path, PathBuf},
};

/// Search family of an engine, read from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    /// Name contains `hybrid`.
    Hybrid,
    /// Name contains `uct`.
    Uct,
    /// Name contains `ab`.
    AlphaBeta,
    Other,
}

impl Family {
    pub fn from_name(name: &str) -> Family {
        let name = name.to_ascii_lowercase();
        if name.contains("hybrid") {
            Family::Hybrid
        } else if name.contains("uct") {
            Family::Uct
        } else if name.contains("ab") {
            Family::AlphaBeta
        } else {
            Family::Other
        }
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Family::Hybrid => "hybrid",
            Family::Uct => "uct",
            Family::AlphaBeta => "alpha-beta",
            Family::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// An engine executable taking part in the battle.
#[derive(Debug, Clone)]
pub struct Engine {
    pub name: String,
    pub path_to_exe: PathBuf,
    pub family: Family,
}

impl PartialEq for Engine {
    fn eq(&self, other: &Self) -> bool {
        self.path_to_exe == other.path_to_exe
    }
}

impl Eq for Engine {}

impl Hash for Engine {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path_to_exe.hash(state);
    }
}

impl Engine {
    pub fn new(name: impl Into<String>, path_to_exe: impl Into<PathBuf>) -> Engine {
        let name = name.into();
        Engine {
            family: Family::from_name(&name),
            name,
            path_to_exe: path_to_exe.into(),
        }
    }

    /// Identity is the file name, without a trailing `.exe`.
    pub fn from_path(path: impl AsRef<Path>) -> Engine {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let name = file_name
            .strip_suffix(".exe")
            .map(str::to_owned)
            .unwrap_or(file_name);
        Engine::new(name, path)
    }
}

impl Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
