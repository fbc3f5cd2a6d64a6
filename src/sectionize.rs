use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Closed vocabulary of document sections produced by the setting workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKey {
    Title,
    Summary,
    Theme,
    ThemeDescription,
    TimePlace,
    WorldSetting,
    WorldSettingBasic,
    WorldSettingFeatures,
    WritingStyle,
    WritingStyleStructure,
    WritingStyleExpression,
    WritingStyleTheme,
    Emotional,
    EmotionalLove,
    EmotionalFeelings,
    EmotionalAtmosphere,
    EmotionalSensuality,
    Characters,
    KeyItems,
    Mystery,
    PlotPattern,
    Act1Overview,
    Act2Overview,
    Act3Overview,
    /// Bucket for headings outside the vocabulary and for heading-less
    /// input. Never silently merged into a neighboring section.
    Unknown,
}

impl SectionKey {
    pub const CANONICAL: [SectionKey; 24] = [
        SectionKey::Title,
        SectionKey::Summary,
        SectionKey::Theme,
        SectionKey::ThemeDescription,
        SectionKey::TimePlace,
        SectionKey::WorldSetting,
        SectionKey::WorldSettingBasic,
        SectionKey::WorldSettingFeatures,
        SectionKey::WritingStyle,
        SectionKey::WritingStyleStructure,
        SectionKey::WritingStyleExpression,
        SectionKey::WritingStyleTheme,
        SectionKey::Emotional,
        SectionKey::EmotionalLove,
        SectionKey::EmotionalFeelings,
        SectionKey::EmotionalAtmosphere,
        SectionKey::EmotionalSensuality,
        SectionKey::Characters,
        SectionKey::KeyItems,
        SectionKey::Mystery,
        SectionKey::PlotPattern,
        SectionKey::Act1Overview,
        SectionKey::Act2Overview,
        SectionKey::Act3Overview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Title => "title",
            SectionKey::Summary => "summary",
            SectionKey::Theme => "theme",
            SectionKey::ThemeDescription => "theme_description",
            SectionKey::TimePlace => "time_place",
            SectionKey::WorldSetting => "world_setting",
            SectionKey::WorldSettingBasic => "world_setting_basic",
            SectionKey::WorldSettingFeatures => "world_setting_features",
            SectionKey::WritingStyle => "writing_style",
            SectionKey::WritingStyleStructure => "writing_style_structure",
            SectionKey::WritingStyleExpression => "writing_style_expression",
            SectionKey::WritingStyleTheme => "writing_style_theme",
            SectionKey::Emotional => "emotional",
            SectionKey::EmotionalLove => "emotional_love",
            SectionKey::EmotionalFeelings => "emotional_feelings",
            SectionKey::EmotionalAtmosphere => "emotional_atmosphere",
            SectionKey::EmotionalSensuality => "emotional_sensuality",
            SectionKey::Characters => "characters",
            SectionKey::KeyItems => "key_items",
            SectionKey::Mystery => "mystery",
            SectionKey::PlotPattern => "plot_pattern",
            SectionKey::Act1Overview => "act1_overview",
            SectionKey::Act2Overview => "act2_overview",
            SectionKey::Act3Overview => "act3_overview",
            SectionKey::Unknown => "unknown",
        }
    }
}

/// Level-2 heading titles emitted by the workflow, mapped to section keys.
/// The Japanese titles are the compatibility surface with the generated
/// documents and must stay byte-exact.
const HEADING_TABLE: &[(&str, SectionKey)] = &[
    ("タイトル", SectionKey::Title),
    ("サマリー", SectionKey::Summary),
    ("テーマ", SectionKey::Theme),
    ("テーマの説明", SectionKey::ThemeDescription),
    ("時代と場所", SectionKey::TimePlace),
    ("作品世界", SectionKey::WorldSetting),
    ("世界観の基本", SectionKey::WorldSettingBasic),
    ("世界観の特徴", SectionKey::WorldSettingFeatures),
    ("作風", SectionKey::WritingStyle),
    ("文章構造", SectionKey::WritingStyleStructure),
    ("表現技法", SectionKey::WritingStyleExpression),
    ("テーマ性", SectionKey::WritingStyleTheme),
    ("情緒的要素", SectionKey::Emotional),
    ("愛情表現", SectionKey::EmotionalLove),
    ("感情表現", SectionKey::EmotionalFeelings),
    ("雰囲気", SectionKey::EmotionalAtmosphere),
    ("官能表現", SectionKey::EmotionalSensuality),
    ("主な登場人物", SectionKey::Characters),
    ("キーアイテム", SectionKey::KeyItems),
    ("謎", SectionKey::Mystery),
    ("プロットパターン", SectionKey::PlotPattern),
];

/// The nested container whose body holds the per-act plot overviews.
const PLOT_HEADING: &str = "プロット";

static ACT_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^###\s*第([0-9]+)幕(?:「[^」]*」)?").unwrap());

fn lookup_heading(title: &str) -> Option<SectionKey> {
    HEADING_TABLE
        .iter()
        .find(|(heading, _)| *heading == title)
        .map(|(_, key)| *key)
}

/// Reverse of the heading table, used when re-rendering a document.
pub fn heading_for(key: SectionKey) -> Option<&'static str> {
    HEADING_TABLE
        .iter()
        .find(|(_, k)| *k == key)
        .map(|(heading, _)| *heading)
}

/// A parsed setting document. Every canonical key is always present,
/// possibly empty, so callers never need to handle missing sections.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    sections: HashMap<SectionKey, String>,
}

impl ParsedDocument {
    pub fn empty() -> Self {
        let mut sections = HashMap::with_capacity(SectionKey::CANONICAL.len() + 1);
        for key in SectionKey::CANONICAL {
            sections.insert(key, String::new());
        }
        sections.insert(SectionKey::Unknown, String::new());
        Self { sections }
    }

    pub fn get(&self, key: SectionKey) -> &str {
        self.sections.get(&key).map(String::as_str).unwrap_or("")
    }

    fn append(&mut self, key: SectionKey, body: &str) {
        let body = body.trim();
        if body.is_empty() {
            return;
        }
        let slot = self.sections.entry(key).or_default();
        if !slot.is_empty() {
            slot.push('\n');
        }
        slot.push_str(body);
    }
}

fn is_horizontal_rule(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-')
}

/// Parse generated Markdown into its named sections.
///
/// Pass 1 splits on `## ` headings and maps each title through the fixed
/// lookup table; unmapped titles land in the `Unknown` bucket with their
/// heading line preserved. Pass 2 re-splits the plot container on
/// `### 第N幕` markers into the per-act overview keys.
///
/// This function must always hand back a well-formed document: if parsing
/// blows up in an unexpected way, the failure is logged and an empty
/// document is returned instead.
pub fn sectionize(markdown: &str) -> ParsedDocument {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sectionize_inner(markdown))) {
        Ok(doc) => doc,
        Err(_) => {
            warn!("sectionize failed on generated text; returning empty document");
            ParsedDocument::empty()
        }
    }
}

fn sectionize_inner(markdown: &str) -> ParsedDocument {
    let mut doc = ParsedDocument::empty();

    let mut current_title: Option<String> = None;
    let mut current_body = String::new();
    let mut sections: Vec<(Option<String>, String)> = Vec::new();

    for line in markdown.lines() {
        if let Some(rest) = line.strip_prefix("## ") {
            sections.push((current_title.take(), std::mem::take(&mut current_body)));
            current_title = Some(rest.trim().to_string());
        } else if is_horizontal_rule(line) {
            // Formatting artifact from the source, not content.
        } else {
            current_body.push_str(line);
            current_body.push('\n');
        }
    }
    sections.push((current_title, current_body));

    for (title, body) in sections {
        match title {
            None => doc.append(SectionKey::Unknown, &body),
            Some(title) if title == PLOT_HEADING => sectionize_acts(&body, &mut doc),
            Some(title) => match lookup_heading(&title) {
                Some(key) => doc.append(key, &body),
                None => {
                    // Keep the heading line so the content stays attributable.
                    let bucketed = format!("## {}\n{}", title, body);
                    doc.append(SectionKey::Unknown, &bucketed);
                }
            },
        }
    }

    doc
}

/// Pass 2: split the plot container body on act markers.
fn sectionize_acts(body: &str, doc: &mut ParsedDocument) {
    let matches: Vec<(usize, usize, u32)> = ACT_HEADING_RE
        .captures_iter(body)
        .filter_map(|cap| {
            let m = cap.get(0)?;
            let number = cap.get(1)?.as_str().parse::<u32>().ok()?;
            Some((m.start(), m.end(), number))
        })
        .collect();

    for (i, (_, heading_end, number)) in matches.iter().enumerate() {
        let span_end = matches
            .get(i + 1)
            .map(|(start, _, _)| *start)
            .unwrap_or(body.len());
        let content = &body[*heading_end..span_end];
        let key = match number {
            1 => SectionKey::Act1Overview,
            2 => SectionKey::Act2Overview,
            3 => SectionKey::Act3Overview,
            _ => {
                warn!("plot container carried unexpected act number {}", number);
                SectionKey::Unknown
            }
        };
        doc.append(key, content);
    }
}
