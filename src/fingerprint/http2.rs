//! HTTP/2 fingerprint configuration (SETTINGS frame + connection window).

/// HTTP/2 SETTINGS for fingerprinting.
///
/// Every field is sent on the client connection. `None` leaves the setting out
/// of the SETTINGS frame. hyper always advertises ENABLE_PUSH=0, so
/// `enable_push` only feeds the fingerprint string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Http2Settings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: Option<u32>,
    pub initial_window_size: u32,
    /// Stream window plus the WINDOW_UPDATE increment sent right after the
    /// preface.
    pub initial_connection_window_size: u32,
    pub max_frame_size: Option<u32>,
    pub max_header_list_size: u32,
}

impl Default for Http2Settings {
    fn default() -> Self {
        Self::chrome()
    }
}

impl Http2Settings {
    /// Chrome 131-133 SETTINGS: 1:65536;2:0;4:6291456;6:262144, WINDOW_UPDATE 15663105.
    pub fn chrome() -> Self {
        Self {
            header_table_size: 65536,
            enable_push: false,
            max_concurrent_streams: None,
            initial_window_size: 6_291_456,
            initial_connection_window_size: 15_663_105 + 65_535,
            max_frame_size: None,
            max_header_list_size: 262_144,
        }
    }

    /// Akamai-style fingerprint string of the SETTINGS and WINDOW_UPDATE frames.
    pub fn akamai_settings(&self) -> String {
        let mut parts = vec![format!("1:{}", self.header_table_size)];
        parts.push(format!("2:{}", u8::from(self.enable_push)));
        if let Some(streams) = self.max_concurrent_streams {
            parts.push(format!("3:{}", streams));
        }
        parts.push(format!("4:{}", self.initial_window_size));
        if let Some(size) = self.max_frame_size {
            parts.push(format!("5:{}", size));
        }
        parts.push(format!("6:{}", self.max_header_list_size));
        format!(
            "{}|{}",
            parts.join(";"),
            self.initial_connection_window_size.saturating_sub(65_535)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_akamai_string() {
        assert_eq!(
            Http2Settings::chrome().akamai_settings(),
            "1:65536;2:0;4:6291456;6:262144|15663105"
        );
    }

    #[test]
    fn optional_settings_appear_in_id_order() {
        let settings = Http2Settings {
            max_concurrent_streams: Some(100),
            max_frame_size: Some(16_384),
            ..Http2Settings::chrome()
        };
        assert_eq!(
            settings.akamai_settings(),
            "1:65536;2:0;3:100;4:6291456;5:16384;6:262144|15663105"
        );
    }
}
