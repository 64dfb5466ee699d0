//! Bundled compatibility patches

use crate::bundle::InjectionBundle;

const GLOBAL_CSS: &str = r#"
html { -webkit-text-size-adjust: 100%; }
body { padding-bottom: env(safe-area-inset-bottom); overscroll-behavior-y: contain; }
.smartbanner, .smart-app-banner, [id^="app-banner"], [class*="install-app-banner"] {
  display: none !important;
}
"#;

const GLOBAL_JS: &str = r#"
if (!document.querySelector('meta[name="viewport"]')) {
  const meta = document.createElement('meta');
  meta.name = 'viewport';
  meta.content = 'width=device-width, initial-scale=1, viewport-fit=cover';
  (document.head || document.documentElement).appendChild(meta);
}
for (const link of document.querySelectorAll('a[target="_blank"]')) {
  link.removeAttribute('target');
}
"#;

const MOODLE_CSS: &str = r#"
#page-footer .mobilelink, .block_mobile_app, .moodle-app-banner { display: none !important; }
.drawer { max-width: 100vw; }
"#;

const MOODLE_JS: &str = r#"
document.body.classList.add('dock-embedded');
for (const el of document.querySelectorAll('a[href^="moodlemobile://"]')) {
  el.remove();
}
"#;

const OUTLOOK_CSS: &str = r#"
[aria-label*="Get the app" i], .o365cs-app-banner { display: none !important; }
"#;

const OUTLOOK_JS: &str = r#"
const dismiss = document.querySelector('button[aria-label*="Continue in browser" i]');
if (dismiss) dismiss.click();
"#;

const TEAMS_JS: &str = r#"
const useWeb = document.querySelector('button[data-tid="joinOnWeb"], a.use-app-lnk');
if (useWeb) useWeb.click();
"#;

pub fn global_bundle() -> InjectionBundle {
    InjectionBundle::new("viewport and safe-area fixes")
        .with_css(GLOBAL_CSS)
        .with_js(GLOBAL_JS)
        .with_delay_ms(300)
}

pub fn app_bundles() -> Vec<(&'static str, InjectionBundle)> {
    vec![
        (
            "moodle",
            InjectionBundle::new("moodle mobile banner removal")
                .with_css(MOODLE_CSS)
                .with_js(MOODLE_JS)
                .with_delay_ms(500),
        ),
        (
            "outlook",
            InjectionBundle::new("outlook app interstitial")
                .with_css(OUTLOOK_CSS)
                .with_js(OUTLOOK_JS)
                .with_delay_ms(1000),
        ),
        (
            "teams",
            InjectionBundle::new("teams join-on-web")
                .with_js(TEAMS_JS)
                .with_delay_ms(1500),
        ),
    ]
}
