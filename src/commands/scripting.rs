//! Server-side scripting.
//!
//! Script results are shape-free, so EVAL and friends surface the raw
//! [`Reply`] and leave interpretation to the caller.

use crate::cmd::{Arg, Command};
use crate::codec::Reply;
use crate::connection::Connection;
use crate::error::Error;

impl Connection {
    /// Evaluate a script with the given keys and extra arguments.
    pub async fn eval(
        &mut self,
        script: impl Into<Arg>,
        keys: &[impl AsRef<[u8]>],
        args: &[impl AsRef<[u8]>],
    ) -> Result<Reply, Error> {
        self.dispatch(
            Command::new("EVAL")
                .arg(script)
                .arg(keys.len())
                .args(keys)
                .args(args),
        )
        .await
    }

    /// Evaluate a script by its SHA-1 digest.
    pub async fn evalsha(
        &mut self,
        sha: impl Into<Arg>,
        keys: &[impl AsRef<[u8]>],
        args: &[impl AsRef<[u8]>],
    ) -> Result<Reply, Error> {
        self.dispatch(
            Command::new("EVALSHA")
                .arg(sha)
                .arg(keys.len())
                .args(keys)
                .args(args),
        )
        .await
    }

    /// Load a script into the server cache, returning its SHA-1 digest.
    pub async fn script_load(&mut self, script: impl Into<Arg>) -> Result<String, Error> {
        self.dispatch(Command::new("SCRIPT").arg("LOAD").arg(script)).await
    }

    /// Which of the given digests are cached, position-aligned.
    pub async fn script_exists(
        &mut self,
        shas: &[impl AsRef<[u8]>],
    ) -> Result<Vec<bool>, Error> {
        self.dispatch(Command::new("SCRIPT").arg("EXISTS").args(shas)).await
    }

    /// Drop the whole script cache.
    pub async fn script_flush(&mut self) -> Result<(), Error> {
        self.dispatch(Command::new("SCRIPT").arg("FLUSH")).await
    }

    /// Kill the currently running script. Refused inside a transaction:
    /// the kill would queue behind the very script it is meant to stop.
    pub async fn script_kill(&mut self) -> Result<(), Error> {
        self.forbid_in_txn("SCRIPT KILL is not allowed inside MULTI")?;
        self.dispatch(Command::new("SCRIPT").arg("KILL")).await
    }
}
