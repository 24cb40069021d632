use crate::core::models::campaign::{Creative, CreativeFormat};

/// Ad markup for a chosen creative. Banner and native serve their
/// template verbatim; video prefers an inline VAST document and
/// otherwise wraps the raw media URL in a minimal VAST 4.0 InLine.
pub fn build_adm(creative: &Creative) -> String {
    match creative.format {
        CreativeFormat::Video => {
            if let Some(vast) = &creative.vast_tag
                && !vast.is_empty()
            {
                return vast.clone();
            }
            if let Some(url) = &creative.video_url
                && !url.is_empty()
            {
                return wrap_vast(creative, url);
            }
            creative.adm_template.clone()
        }
        _ => creative.adm_template.clone(),
    }
}

fn wrap_vast(creative: &Creative, video_url: &str) -> String {
    format!(
        concat!(
            r#"<VAST version="4.0"><Ad id="{id}"><InLine>"#,
            r#"<AdSystem>kite</AdSystem><AdTitle>{id}</AdTitle>"#,
            r#"<Creatives><Creative><Linear><MediaFiles>"#,
            r#"<MediaFile delivery="progressive" type="video/mp4" width="{w}" height="{h}">"#,
            "<![CDATA[{url}]]>",
            r#"</MediaFile></MediaFiles></Linear></Creative></Creatives>"#,
            r#"</InLine></Ad></VAST>"#
        ),
        id = creative.id,
        w = creative.w,
        h = creative.h,
        url = video_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_template_verbatim() {
        let c = Creative {
            adm_template: "<div>hi</div>".into(),
            ..Default::default()
        };
        assert_eq!(build_adm(&c), "<div>hi</div>");
    }

    #[test]
    fn inline_vast_preferred() {
        let c = Creative {
            format: CreativeFormat::Video,
            vast_tag: Some("<VAST>inline</VAST>".into()),
            video_url: Some("https://cdn.example.com/ad.mp4".into()),
            ..Default::default()
        };
        assert_eq!(build_adm(&c), "<VAST>inline</VAST>");
    }

    #[test]
    fn video_url_wrapped_in_cdata() {
        let c = Creative {
            id: "cr7".into(),
            format: CreativeFormat::Video,
            w: 640,
            h: 480,
            video_url: Some("https://cdn.example.com/ad.mp4".into()),
            ..Default::default()
        };
        let adm = build_adm(&c);
        assert!(adm.starts_with(r#"<VAST version="4.0">"#));
        assert!(adm.contains("<![CDATA[https://cdn.example.com/ad.mp4]]>"));
        assert!(adm.contains(r#"width="640" height="480""#));
    }
}
