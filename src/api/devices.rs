use serde_json::Value;

use super::{ApiClient, ApiError};

#[derive(Debug, Clone, Copy)]
pub struct DeviceQuery {
    pub offset: u32,
    pub limit: u32,
    pub item_id: Option<u32>,
}

/// Fetch the device list visible to the API key. The response is passed
/// through as-is; callers decide how to present it.
pub async fn list(client: &ApiClient, query: &DeviceQuery) -> Result<Value, ApiError> {
    let mut request = client
        .get(&client.endpoint("/v2/devices"))
        .query(&[("offset", query.offset), ("limit", query.limit)]);
    if let Some(item_id) = query.item_id {
        request = request.query(&[("item_id", item_id)]);
    }

    let devices = request.send().await?.error_for_status()?.json().await?;
    Ok(devices)
}
