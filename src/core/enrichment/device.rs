use moka::sync::Cache;

/// Parsed device facts from a user agent. Everything is lowercase and
/// empty means unknown; these strings land verbatim in click records
/// and macro values, so they stay stable across releases.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub os: String,
    pub device_type: String,
    pub make: String,
    pub model: String,
}

/// Substring UA classifier with a bounded cache in front.
///
/// The rules are deliberately conservative: a small fixed token set,
/// unknown left empty. A full UA parser would classify more traffic but
/// would also drift whenever its database updates, and attribution
/// partners compare these fields bit-for-bit.
pub struct DeviceLookup {
    cache: Cache<String, DeviceInfo>,
}

fn classify(user_agent: &str) -> DeviceInfo {
    let ua = user_agent.to_lowercase();

    // iphone/ipad before mac: iOS agents carry "like Mac OS X"
    let os = if ua.contains("android") {
        "android"
    } else if ua.contains("iphone") || ua.contains("ipad") {
        "ios"
    } else if ua.contains("windows") {
        "windows"
    } else if ua.contains("mac") {
        "macos"
    } else {
        ""
    };

    let device_type = if ua.contains("ipad") || ua.contains("tablet") {
        "tablet"
    } else if ua.contains("iphone") || ua.contains("mobile") {
        "phone"
    } else if os == "android" {
        // android without a tablet marker is overwhelmingly a handset
        "phone"
    } else if os == "windows" || os == "macos" {
        "desktop"
    } else {
        ""
    };

    let make = if ua.contains("samsung") {
        "samsung"
    } else if ua.contains("huawei") {
        "huawei"
    } else if ua.contains("xiaomi") {
        "xiaomi"
    } else if ua.contains("pixel") {
        "google"
    } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("mac") {
        "apple"
    } else {
        ""
    };

    let model = if ua.contains("iphone") {
        "iphone"
    } else if ua.contains("ipad") {
        "ipad"
    } else if ua.contains("pixel") {
        "pixel"
    } else {
        ""
    };

    DeviceInfo {
        os: os.into(),
        device_type: device_type.into(),
        make: make.into(),
        model: model.into(),
    }
}

impl DeviceLookup {
    pub fn new(cache_sz: u64) -> Self {
        DeviceLookup {
            cache: Cache::new(cache_sz),
        }
    }

    pub fn lookup_ua(&self, user_agent: &str) -> DeviceInfo {
        if user_agent.is_empty() {
            return DeviceInfo::default();
        }

        self.cache
            .get_with(user_agent.to_string(), || classify(user_agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn android_phone() {
        let info = classify("Mozilla/5.0 (Linux; Android 13; SM-S901B) Mobile Safari/537.36");
        assert_eq!(info.os, "android");
        assert_eq!(info.device_type, "phone");
        assert_eq!(info.make, "samsung");
    }

    #[test]
    fn iphone_is_ios_apple() {
        let info =
            classify("Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) Version/16.0 Safari");
        assert_eq!(info.os, "ios");
        assert_eq!(info.device_type, "phone");
        assert_eq!(info.make, "apple");
        assert_eq!(info.model, "iphone");
    }

    #[test]
    fn ipad_is_tablet() {
        let info = classify("Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X)");
        assert_eq!(info.device_type, "tablet");
        assert_eq!(info.make, "apple");
    }

    #[test]
    fn pixel_maps_to_google() {
        let info = classify("Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile");
        assert_eq!(info.make, "google");
        assert_eq!(info.model, "pixel");
    }

    #[test]
    fn desktop_windows() {
        let info = classify("Mozilla/5.0 (Windows NT 10.0; Win64; x64)");
        assert_eq!(info.os, "windows");
        assert_eq!(info.device_type, "desktop");
        assert_eq!(info.make, "");
    }

    #[test]
    fn unknown_ua_stays_empty() {
        assert_eq!(classify("curl/8.0"), DeviceInfo::default());
    }
}
