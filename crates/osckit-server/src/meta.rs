//! Reserved `/_osckit/` introspection routes
//!
//! Every socket answers these. The sole argument of a query is the port to
//! answer on; the answer goes to the sender's IP at that port, on the query
//! address with `/answer` appended.

use anyhow::{anyhow, Context};
use osckit_core::{OscValue, VERSION};
use std::sync::Weak;

use crate::callback::{Callback, Request};
use crate::server::Inner;

pub const META_PREFIX: &str = "/_osckit";

pub const VERSION_ADDRESS: &str = "/_osckit/version";
pub const ROUTES_ADDRESS: &str = "/_osckit/routes";
pub const STATS_RECEIVED_ADDRESS: &str = "/_osckit/stats/received";
pub const STATS_SENT_ADDRESS: &str = "/_osckit/stats/sent";

/// Address an answer to `query` is sent on
pub fn answer_address(query: &str) -> String {
    format!("{}/answer", query)
}

fn reply_port(request: &Request<'_>) -> anyhow::Result<u16> {
    let port = request
        .values()
        .first()
        .and_then(OscValue::as_int)
        .ok_or_else(|| anyhow!("expected the port to answer on as an int argument"))?;
    u16::try_from(port).with_context(|| format!("invalid answer port {}", port))
}

fn answering<F>(query: &'static str, server: Weak<Inner>, reply: F) -> (&'static str, Callback)
where
    F: Fn(&Inner, &Request<'_>) -> Vec<OscValue> + Send + Sync + 'static,
{
    let callback = Callback::new(move |request| {
        let port = reply_port(request)?;
        let inner = server
            .upgrade()
            .ok_or_else(|| anyhow!("server is gone"))?;
        let values = reply(&*inner, request);
        request.answer(answer_address(query), &values, Some(port))?;
        Ok(())
    });
    (query, callback)
}

/// Fresh callbacks for the reserved routes of one socket
pub(crate) fn routes(server: Weak<Inner>) -> Vec<(&'static str, Callback)> {
    vec![
        answering(VERSION_ADDRESS, server.clone(), |_, _| {
            vec![OscValue::string(VERSION)]
        }),
        answering(ROUTES_ADDRESS, server.clone(), |inner, request| {
            inner
                .addresses(request.socket())
                .into_iter()
                .map(OscValue::String)
                .collect()
        }),
        answering(STATS_RECEIVED_ADDRESS, server.clone(), |inner, _| {
            inner.stats_received().to_values()
        }),
        answering(STATS_SENT_ADDRESS, server, |inner, _| {
            inner.stats_sent().to_values()
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_address() {
        assert_eq!(answer_address(VERSION_ADDRESS), "/_osckit/version/answer");
    }

    #[test]
    fn test_addresses_under_prefix() {
        for address in [
            VERSION_ADDRESS,
            ROUTES_ADDRESS,
            STATS_RECEIVED_ADDRESS,
            STATS_SENT_ADDRESS,
        ] {
            assert!(address.starts_with(META_PREFIX));
        }
    }
}
