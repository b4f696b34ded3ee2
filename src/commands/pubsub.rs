//! Publishing. Subscribing lives on the connection core itself
//! ([`Connection::subscribe_with`](crate::Connection::subscribe_with)),
//! since it is a mode transition rather than a plain command.

use crate::cmd::{Arg, Command};
use crate::connection::Connection;
use crate::error::Error;

impl Connection {
    /// Publish `payload` to `channel`, returning the number of
    /// subscribers it reached.
    pub async fn publish(
        &mut self,
        channel: impl Into<Arg>,
        payload: impl Into<Arg>,
    ) -> Result<i64, Error> {
        self.dispatch(Command::new("PUBLISH").arg(channel).arg(payload)).await
    }
}
