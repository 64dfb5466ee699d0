//! Messages posted from injected page script

use dock_download::DownloadRequest;
use serde_json::Value;

use crate::error::SurfaceError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMessage {
    /// `{type: 'download', url, filename?, headers?, method?, formData?}`
    Download(DownloadRequest),
    /// Any other `type`, ignored by the controller
    Other(String),
}

impl PageMessage {
    /// Parse a bridge payload. Pages post either an object or its JSON text.
    pub fn parse(payload: Value) -> Result<Self> {
        let value = match payload {
            Value::String(text) => serde_json::from_str(&text)
                .map_err(|e| SurfaceError::MalformedMessage(e.to_string()))?,
            other => other,
        };

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SurfaceError::MalformedMessage("missing type".to_string()))?
            .to_string();

        match kind.as_str() {
            "download" => {
                let request: DownloadRequest = serde_json::from_value(value)
                    .map_err(|e| SurfaceError::MalformedMessage(e.to_string()))?;
                if request.url.trim().is_empty() {
                    return Err(SurfaceError::MalformedMessage("empty download url".to_string()));
                }
                Ok(PageMessage::Download(request))
            }
            _ => Ok(PageMessage::Other(kind)),
        }
    }
}
