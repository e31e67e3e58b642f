use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::shared::utils::is_hex_color;
use crate::storage::Entity;

pub const MAX_SECTIONS: usize = 30;

/// First-generation page: a fixed layout with a handful of fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimpleLandingPage {
    pub headline: String,
    #[serde(default)]
    pub subheadline: Option<String>,
    #[serde(default)]
    pub hero_image_url: Option<String>,
    #[serde(default = "default_cta")]
    pub cta_text: String,
    #[serde(default = "default_color")]
    pub primary_color: String,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default = "default_true")]
    pub show_booking: bool,
}

fn default_cta() -> String {
    "Book a session".to_string()
}

fn default_color() -> String {
    "#4f46e5".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    #[serde(default = "default_color")]
    pub primary_color: String,
    #[serde(default = "default_background")]
    pub background_color: String,
    #[serde(default)]
    pub font_family: Option<String>,
}

fn default_background() -> String {
    "#ffffff".to_string()
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_color: default_color(),
            background_color: default_background(),
            font_family: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SectionContent {
    #[serde(rename_all = "camelCase")]
    Hero {
        headline: String,
        #[serde(default)]
        subheadline: Option<String>,
        #[serde(default)]
        image_url: Option<String>,
        #[serde(default)]
        cta_text: Option<String>,
    },
    Text {
        #[serde(default)]
        title: Option<String>,
        body: String,
    },
    Services {
        #[serde(default)]
        title: Option<String>,
        items: Vec<ListItem>,
    },
    Testimonials {
        items: Vec<ListItem>,
    },
    Gallery {
        images: Vec<String>,
    },
    Faq {
        items: Vec<ListItem>,
    },
    Booking {
        #[serde(default)]
        title: Option<String>,
    },
    Contact {
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        phone: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(flatten)]
    pub content: SectionContent,
}

impl Section {
    pub fn is_hero(&self) -> bool {
        matches!(self.content, SectionContent::Hero { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComposableLandingPage {
    #[serde(default)]
    pub theme: Theme,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "version", rename_all = "lowercase")]
pub enum LandingPageConfig {
    Simple(SimpleLandingPage),
    Composable(ComposableLandingPage),
}

impl LandingPageConfig {
    /// Starter page for a tenant that never saved one.
    pub fn starter(business_name: &str) -> Self {
        Self::Simple(SimpleLandingPage {
            headline: business_name.to_string(),
            subheadline: None,
            hero_image_url: None,
            cta_text: default_cta(),
            primary_color: default_color(),
            about: None,
            show_booking: true,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Simple(page) => {
                if page.headline.trim().is_empty() {
                    return Err("Headline is required".to_string());
                }
                check_color("primaryColor", &page.primary_color)
            }
            Self::Composable(page) => validate_composable(page),
        }
    }

    /// Converts a simple page into the equivalent section list. Returns `None`
    /// when the page is already composable.
    pub fn upgraded(&self) -> Option<ComposableLandingPage> {
        let Self::Simple(page) = self else {
            return None;
        };

        let mut sections = vec![Section {
            id: "hero".to_string(),
            visible: true,
            content: SectionContent::Hero {
                headline: page.headline.clone(),
                subheadline: page.subheadline.clone(),
                image_url: page.hero_image_url.clone(),
                cta_text: Some(page.cta_text.clone()),
            },
        }];
        if let Some(about) = page.about.as_deref().filter(|a| !a.trim().is_empty()) {
            sections.push(Section {
                id: "about".to_string(),
                visible: true,
                content: SectionContent::Text {
                    title: Some("About".to_string()),
                    body: about.to_string(),
                },
            });
        }
        sections.push(Section {
            id: "booking".to_string(),
            visible: page.show_booking,
            content: SectionContent::Booking { title: None },
        });

        Some(ComposableLandingPage {
            theme: Theme {
                primary_color: page.primary_color.clone(),
                ..Theme::default()
            },
            sections,
        })
    }
}

fn check_color(field: &str, value: &str) -> Result<(), String> {
    if is_hex_color(value) {
        Ok(())
    } else {
        Err(format!("{field} must be a #rrggbb color, got {value}"))
    }
}

fn validate_composable(page: &ComposableLandingPage) -> Result<(), String> {
    check_color("theme.primaryColor", &page.theme.primary_color)?;
    check_color("theme.backgroundColor", &page.theme.background_color)?;

    if page.sections.len() > MAX_SECTIONS {
        return Err(format!("A page can have at most {MAX_SECTIONS} sections"));
    }

    let mut seen = HashSet::new();
    for section in &page.sections {
        if section.id.trim().is_empty() {
            return Err("Section ids cannot be empty".to_string());
        }
        if !seen.insert(section.id.as_str()) {
            return Err(format!("Duplicate section id {}", section.id));
        }
    }

    if page.sections.iter().filter(|s| s.is_hero()).count() > 1 {
        return Err("Only one hero section is allowed".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LandingPage {
    pub config: LandingPageConfig,
    #[serde(default)]
    pub published: bool,
    pub updated_at: DateTime<Utc>,
}

impl Entity for LandingPage {
    const KIND: &'static str = "LANDING";

    fn entity_id(&self) -> String {
        "current".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(id: &str) -> Section {
        Section {
            id: id.to_string(),
            visible: true,
            content: SectionContent::Text {
                title: None,
                body: "Hello".to_string(),
            },
        }
    }

    fn hero(id: &str) -> Section {
        Section {
            id: id.to_string(),
            visible: true,
            content: SectionContent::Hero {
                headline: "Welcome".to_string(),
                subheadline: None,
                image_url: None,
                cta_text: None,
            },
        }
    }

    fn composable(sections: Vec<Section>) -> LandingPageConfig {
        LandingPageConfig::Composable(ComposableLandingPage {
            theme: Theme::default(),
            sections,
        })
    }

    #[test]
    fn test_deserializes_both_versions() {
        let simple: LandingPageConfig = serde_json::from_str(
            r##"{"version":"simple","headline":"Sunrise Yoga","primaryColor":"#112233"}"##,
        )
        .unwrap();
        assert!(matches!(simple, LandingPageConfig::Simple(ref p) if p.show_booking));

        let page: LandingPageConfig = serde_json::from_str(
            r#"{"version":"composable","sections":[
                {"id":"h","type":"hero","headline":"Hi","ctaText":"Go"},
                {"id":"f","type":"faq","visible":false,"items":[{"title":"Q?"}]}
            ]}"#,
        )
        .unwrap();
        let LandingPageConfig::Composable(page) = page else {
            panic!("expected composable");
        };
        assert_eq!(page.sections.len(), 2);
        assert!(page.sections[0].is_hero());
        assert!(!page.sections[1].visible);
        assert_eq!(page.theme, Theme::default());
    }

    #[test]
    fn test_section_rules() {
        assert!(composable(vec![hero("a"), text("b")]).validate().is_ok());
        assert!(composable(vec![text("a"), text("a")])
            .validate()
            .unwrap_err()
            .contains("Duplicate"));
        assert!(composable(vec![text(" ")]).validate().is_err());
        assert!(composable(vec![hero("a"), hero("b")])
            .validate()
            .unwrap_err()
            .contains("hero"));

        let many = (0..=MAX_SECTIONS).map(|i| text(&format!("s{i}"))).collect();
        assert!(composable(many).validate().is_err());
    }

    #[test]
    fn test_colors_validated() {
        let mut page = ComposableLandingPage::default();
        page.theme.primary_color = "red".to_string();
        assert!(LandingPageConfig::Composable(page).validate().is_err());

        let LandingPageConfig::Simple(mut simple) = LandingPageConfig::starter("Studio") else {
            panic!("expected simple");
        };
        simple.primary_color = "#12345".to_string();
        assert!(LandingPageConfig::Simple(simple).validate().is_err());
    }

    #[test]
    fn test_upgrade_keeps_content() {
        let config = LandingPageConfig::Simple(SimpleLandingPage {
            headline: "Sunrise Yoga".to_string(),
            subheadline: Some("Morning flow".to_string()),
            hero_image_url: None,
            cta_text: "Join".to_string(),
            primary_color: "#ff8800".to_string(),
            about: Some("Small classes.".to_string()),
            show_booking: false,
        });

        let upgraded = config.upgraded().unwrap();
        assert_eq!(upgraded.theme.primary_color, "#ff8800");
        let ids: Vec<_> = upgraded.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["hero", "about", "booking"]);
        assert!(!upgraded.sections[2].visible);
        assert!(LandingPageConfig::Composable(upgraded.clone()).validate().is_ok());
        assert!(LandingPageConfig::Composable(upgraded).upgraded().is_none());
    }
}
