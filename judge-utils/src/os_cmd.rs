use std::ffi::{OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

/// A program invocation as an argument array. Nothing here goes through a shell.
#[derive(Clone, PartialEq, Eq)]
pub struct OsCmd {
    pub bin: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<OsString>,
}

impl OsCmd {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Builds a command from `argv`, where `argv[0]` is the program.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_argv(argv: &[&str]) -> Option<Self> {
        let (bin, args) = argv.split_first()?;
        let mut cmd = Self::new(*bin);
        cmd.args(args.iter().copied());
        Some(cmd)
    }

    pub fn arg(&mut self, a: impl Into<OsString>) -> &mut Self {
        self.args.push(a.into());
        self
    }

    pub fn args<I>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Marks `k` to be copied from the launcher's own environment.
    pub fn inherit_env(&mut self, k: impl Into<OsString>) -> &mut Self {
        self.env.push(k.into());
        self
    }

    pub fn add_env(&mut self, k: impl Into<OsString>, v: impl AsRef<OsStr>) -> &mut Self {
        let mut e: OsString = k.into();
        e.push(OsStr::from_bytes(b"="));
        e.push(v.as_ref());
        self.env.push(e);
        self
    }

    /// Splits every env entry into a key and an optional explicit value.
    pub fn env_pairs(&self) -> impl Iterator<Item = (&OsStr, Option<&OsStr>)> {
        self.env.iter().map(|e| {
            let bytes = e.as_bytes();
            match bytes.iter().position(|&b| b == b'=') {
                Some(pos) => (
                    OsStr::from_bytes(&bytes[..pos]),
                    Some(OsStr::from_bytes(&bytes[pos + 1..])),
                ),
                None => (e.as_os_str(), None),
            }
        })
    }
}

impl fmt::Debug for OsCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.bin)?;
        for a in &self.args {
            write!(f, " {:?}", a)?;
        }
        Ok(())
    }
}
