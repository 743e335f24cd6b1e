//! Live connection to Telegram
//!
//! The one place this crate talks to the network. A connection is opened
//! with the session's own credentials and API identity, used for a single
//! `get_me` query, and released on every exit path: the grammers client owns
//! the transport, so dropping it (success, dead session or transport error
//! alike) closes the connection.

use std::net::SocketAddr;

use grammers_client::{Client, Config, InitParams};
use grammers_mtsender::InvocationError;
use grammers_session::Session;

use crate::api::ApiIdentity;
use crate::{dc, Result, AUTH_KEY_SIZE};

/// Open a connection to the session's home datacenter
pub(crate) async fn connect(
    dc_id: i32,
    auth_key: &[u8; AUTH_KEY_SIZE],
    user_id: Option<i64>,
    api: &ApiIdentity,
    proxy: Option<&str>,
) -> Result<Client> {
    let (ip, port) = dc::address(dc_id)?;
    let addr = SocketAddr::new(ip.into(), port);

    let session = Session::new();
    session.insert_dc(dc_id, addr, *auth_key);
    // Home DC must be set so grammers dials our DC instead of the default
    session.set_user(user_id.unwrap_or(0), dc_id, false);

    let params = InitParams {
        device_model: api.device_model.clone(),
        system_version: api.system_version.clone(),
        app_version: api.app_version.clone(),
        lang_code: api.lang_code.clone(),
        system_lang_code: api.system_lang_code.clone(),
        // Conversions never consume updates
        update_queue_limit: Some(0),
        proxy_url: proxy.map(str::to_string),
        ..Default::default()
    };

    tracing::debug!("Connecting to DC {} at {}", dc_id, addr);

    let client = Client::connect(Config {
        session,
        api_id: api.api_id,
        api_hash: api.api_hash.clone(),
        params,
    })
    .await?;

    Ok(client)
}

/// Query the account's own identity over a scoped connection
///
/// Returns `Ok(None)` when Telegram reports the session unauthorized
/// (revoked or never logged in); transport failures propagate unchanged.
pub(crate) async fn fetch_self_id(
    dc_id: i32,
    auth_key: &[u8; AUTH_KEY_SIZE],
    user_id: Option<i64>,
    api: &ApiIdentity,
    proxy: Option<&str>,
) -> Result<Option<i64>> {
    let client = connect(dc_id, auth_key, user_id, api, proxy).await?;

    match client.get_me().await {
        Ok(me) => {
            tracing::debug!("Live query resolved user id {}", me.id());
            Ok(Some(me.id()))
        }
        Err(InvocationError::Rpc(rpc)) if rpc.code == 401 => {
            tracing::debug!("Live query unauthorized: {}", rpc.name);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
