use crate::core::models::campaign::{AuditStatus, Creative, CreativeFormat};
use crate::core::openrtb::Imp;

fn eligible(creative: &Creative, format: CreativeFormat) -> bool {
    creative.format == format && creative.audit_status != AuditStatus::Rejected
}

/// Picks the creative serving one impression, or `None` when nothing
/// fits. Dispatch is shape-first on the impression's declared media
/// object (video, then native, audio, banner); within a shape the line
/// item's creative order decides among equals.
pub fn select_creative<'a>(imp: &Imp, creatives: &'a [Creative]) -> Option<&'a Creative> {
    if imp.video.is_some() {
        return creatives.iter().find(|c| eligible(c, CreativeFormat::Video));
    }
    if imp.native.is_some() {
        return creatives.iter().find(|c| eligible(c, CreativeFormat::Native));
    }
    if imp.audio.is_some() {
        return creatives.iter().find(|c| eligible(c, CreativeFormat::Audio));
    }

    let banner = imp.banner.as_ref()?;
    let banners: Vec<&Creative> = creatives
        .iter()
        .filter(|c| eligible(c, CreativeFormat::Banner))
        .collect();

    // exact declared size first
    if let (Some(w), Some(h)) = (banner.w, banner.h)
        && let Some(hit) = banners.iter().find(|c| c.w == w && c.h == h)
    {
        return Some(*hit);
    }

    // any size from the alternate format list
    if let Some(hit) = banners
        .iter()
        .find(|c| banner.format.iter().any(|f| f.w == c.w && f.h == c.h))
    {
        return Some(*hit);
    }

    // a creative that covers the slot
    if let (Some(w), Some(h)) = (banner.w, banner.h) {
        return banners.iter().find(|c| c.w >= w && c.h >= h).copied();
    }

    // impression declared no size at all: first banner creative
    if banner.format.is_empty() {
        return banners.first().copied();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::openrtb::request::{Banner, Format, Video};

    fn banner_creative(id: &str, w: u32, h: u32) -> Creative {
        Creative {
            id: id.into(),
            format: CreativeFormat::Banner,
            w,
            h,
            ..Default::default()
        }
    }

    fn banner_imp(w: Option<u32>, h: Option<u32>, formats: Vec<Format>) -> Imp {
        Imp {
            id: "1".into(),
            banner: Some(Banner {
                w,
                h,
                format: formats,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn exact_size_wins_over_cover() {
        let creatives = vec![banner_creative("big", 728, 90), banner_creative("exact", 320, 50)];
        let imp = banner_imp(Some(320), Some(50), vec![]);
        assert_eq!(select_creative(&imp, &creatives).unwrap().id, "exact");
    }

    #[test]
    fn format_list_fallback() {
        let creatives = vec![banner_creative("alt", 300, 250)];
        let imp = banner_imp(Some(320), Some(50), vec![Format { w: 300, h: 250 }]);
        assert_eq!(select_creative(&imp, &creatives).unwrap().id, "alt");
    }

    #[test]
    fn covering_creative_accepted() {
        let creatives = vec![banner_creative("big", 728, 90)];
        let imp = banner_imp(Some(320), Some(50), vec![]);
        assert_eq!(select_creative(&imp, &creatives).unwrap().id, "big");
    }

    #[test]
    fn sizeless_impression_takes_first_banner() {
        let creatives = vec![banner_creative("first", 320, 50), banner_creative("second", 300, 250)];
        let imp = banner_imp(None, None, vec![]);
        assert_eq!(select_creative(&imp, &creatives).unwrap().id, "first");
    }

    #[test]
    fn video_imp_dispatches_on_shape() {
        let creatives = vec![
            banner_creative("banner", 320, 50),
            Creative {
                id: "vid".into(),
                format: CreativeFormat::Video,
                ..Default::default()
            },
        ];
        let imp = Imp {
            id: "1".into(),
            video: Some(Video::default()),
            banner: Some(Banner::default()),
            ..Default::default()
        };
        assert_eq!(select_creative(&imp, &creatives).unwrap().id, "vid");
    }

    #[test]
    fn rejected_creative_never_serves() {
        let mut rejected = banner_creative("bad", 320, 50);
        rejected.audit_status = AuditStatus::Rejected;
        let imp = banner_imp(Some(320), Some(50), vec![]);
        assert!(select_creative(&imp, &[rejected]).is_none());
    }

    #[test]
    fn no_media_object_no_fit() {
        let imp = Imp {
            id: "1".into(),
            ..Default::default()
        };
        assert!(select_creative(&imp, &[banner_creative("b", 320, 50)]).is_none());
    }
}
