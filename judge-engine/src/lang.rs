use judge_protocol::error::RequestError;
use judge_utils::os_cmd::OsCmd;

use anyhow::{format_err, Result};

/// How to build and launch programs written in one language.
///
/// Commands are argument vectors executed inside the workspace directory,
/// so relative paths refer to files the engine placed there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSpec {
    pub id: &'static str,
    pub source_file_name: &'static str,
    pub compile_command: Option<&'static [&'static str]>,
    pub run_command: &'static [&'static str],
    /// Whether the memory ceiling may be enforced as an address space limit.
    /// Managed runtimes reserve far more virtual memory than they use.
    pub limit_address_space: bool,
}

macro_rules! native {
    ($id:literal, $src:literal, [$($compile:expr),+]) => {
        LanguageSpec {
            id: $id,
            source_file_name: $src,
            compile_command: Some(&[$($compile),+]),
            run_command: &["./main"],
            limit_address_space: true,
        }
    };
}

macro_rules! gcc {
    ($id:literal, $std:literal) => {
        native!(
            $id,
            "main.c",
            ["gcc", concat!("-std=", $std), "-O2", "-o", "main", "main.c", "-lm"]
        )
    };
}

macro_rules! gxx {
    ($id:literal, $std:literal) => {
        native!($id, "main.cpp", ["g++", concat!("-std=", $std), "-O2", "-o", "main", "main.cpp"])
    };
}

pub static LANGUAGES: &[LanguageSpec] = &[
    gcc!("c99", "c99"),
    gcc!("c11", "c11"),
    gcc!("c17", "c17"),
    gcc!("c23", "c2x"),
    gxx!("c++03", "c++03"),
    gxx!("c++11", "c++11"),
    gxx!("c++14", "c++14"),
    gxx!("c++17", "c++17"),
    gxx!("c++20", "c++20"),
    gxx!("c++23", "c++2b"),
    native!("rust", "main.rs", ["rustc", "-O", "-o", "main", "main.rs"]),
    LanguageSpec {
        id: "java",
        source_file_name: "Main.java",
        compile_command: Some(&["javac", "-encoding", "UTF-8", "Main.java"]),
        run_command: &["java", "-cp", ".", "Main"],
        limit_address_space: false,
    },
    LanguageSpec {
        id: "python2",
        source_file_name: "main.py",
        compile_command: None,
        run_command: &["python2", "main.py"],
        limit_address_space: true,
    },
    LanguageSpec {
        id: "python3",
        source_file_name: "main.py",
        compile_command: None,
        run_command: &["python3", "main.py"],
        limit_address_space: true,
    },
    LanguageSpec {
        id: "javascript",
        source_file_name: "main.js",
        compile_command: None,
        run_command: &["node", "main.js"],
        limit_address_space: false,
    },
];

/// Finds the language registered under `id`.
pub fn lookup(id: &str) -> Result<&'static LanguageSpec, RequestError> {
    LANGUAGES
        .iter()
        .find(|lang| lang.id == id)
        .ok_or_else(|| RequestError::UnsupportedLanguage(id.to_owned()))
}

fn build_cmd(id: &str, argv: &[&str]) -> Result<OsCmd> {
    let mut cmd =
        OsCmd::from_argv(argv).ok_or_else(|| format_err!("empty command for language {}", id))?;
    cmd.inherit_env("PATH");
    Ok(cmd)
}

impl LanguageSpec {
    pub fn compile_cmd(&self) -> Result<Option<OsCmd>> {
        self.compile_command
            .map(|argv| build_cmd(self.id, argv))
            .transpose()
    }

    pub fn run_cmd(&self) -> Result<OsCmd> {
        build_cmd(self.id, self.run_command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn registry() {
        let mut ids = HashSet::new();
        for lang in LANGUAGES {
            assert!(ids.insert(lang.id), "duplicate language {}", lang.id);
            assert!(!lang.run_command.is_empty());
            assert!(!lang.source_file_name.is_empty());
            if let Some(argv) = lang.compile_command {
                assert!(argv.contains(&lang.source_file_name));
            }
        }
        assert_eq!(LANGUAGES.len(), 15);
    }

    #[test]
    fn lookup_language() {
        let java = lookup("java").unwrap();
        assert_eq!(java.source_file_name, "Main.java");
        assert!(java.compile_command.is_some());
        assert_eq!(java.run_command, &["java", "-cp", ".", "Main"]);

        let python = lookup("python3").unwrap();
        assert!(python.compile_cmd().unwrap().is_none());

        let cpp = lookup("c++17").unwrap();
        let cmd = cpp.compile_cmd().unwrap().unwrap();
        assert_eq!(cmd.bin.to_str(), Some("g++"));
        assert_eq!(cmd.args[0], "-std=c++17");

        let err = lookup("brainfuck").unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedLanguage(ref id) if id == "brainfuck"));
    }

    #[test]
    fn commands_inherit_path() {
        let cmd = lookup("python3").unwrap().run_cmd().unwrap();
        let keys: Vec<_> = cmd.env_pairs().map(|(key, _)| key.to_owned()).collect();
        assert_eq!(keys, ["PATH"]);
    }
}
