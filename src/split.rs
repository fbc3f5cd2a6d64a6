use once_cell::sync::Lazy;
use regex::Regex;

/// One numbered sub-unit extracted from a generated document.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub number: u32,
    pub title: String,
    /// Body text, excluding the heading line that introduced the entity.
    pub content: String,
}

/// Which strategy produced the split. Part of the return value so callers
/// and tests can assert which tier fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// The heading grammar matched at least once.
    HeadingPattern,
    /// No headings; the text was divided into equal line-count chunks.
    LineCount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    pub entities: Vec<Entity>,
    pub strategy: SplitStrategy,
}

/// The two entity grammars the generation workflows emit. The full-width
/// punctuation is load-bearing: only an exact match triggers the primary
/// strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// `## 第N幕「タイトル」` (title optional in practice)
    Act,
    /// `### エピソードN「タイトル」`
    Episode,
}

static ACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^##\s*第([0-9]+)幕(?:「([^」]*)」)?").unwrap());
static EPISODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^###\s*エピソード([0-9]+)(?:「([^」]*)」)?").unwrap());

impl EntityKind {
    fn heading_re(&self) -> &'static Regex {
        match self {
            EntityKind::Act => &ACT_RE,
            EntityKind::Episode => &EPISODE_RE,
        }
    }

    /// Title synthesized under the fallback strategy or when the heading
    /// carried no quoted title.
    pub fn default_title(&self, number: u32) -> String {
        match self {
            EntityKind::Act => format!("第{}幕", number),
            EntityKind::Episode => format!("エピソード{}", number),
        }
    }
}

/// Split a Markdown body holding numbered sibling entities.
///
/// Primary strategy: every heading match opens an entity whose content runs
/// to the next match (or end of text), with the heading line stripped.
/// Numbers come from the headings in source order and are not renumbered.
///
/// Fallback (zero matches): the text is divided into `expected_count`
/// contiguous chunks by line count, remainder to the last chunk, with
/// sequential numbers and synthesized titles.
///
/// Empty input never errors; it yields an empty list, which the caller
/// treats as a generation failure.
pub fn split(markdown: &str, expected_count: usize, kind: EntityKind) -> SplitOutcome {
    let matches: Vec<(usize, u32, Option<String>)> = kind
        .heading_re()
        .captures_iter(markdown)
        .filter_map(|cap| {
            let m = cap.get(0)?;
            let number = cap.get(1)?.as_str().parse::<u32>().ok()?;
            let title = cap.get(2).map(|t| t.as_str().to_string());
            Some((m.start(), number, title))
        })
        .collect();

    if !matches.is_empty() {
        let mut entities = Vec::with_capacity(matches.len());
        for (i, (start, number, title)) in matches.iter().enumerate() {
            let end = matches
                .get(i + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(markdown.len());
            let segment = &markdown[*start..end];
            // Strip the heading line itself from the content.
            let content = match segment.find('\n') {
                Some(pos) => &segment[pos + 1..],
                None => "",
            };
            entities.push(Entity {
                number: *number,
                title: title.clone().unwrap_or_else(|| kind.default_title(*number)),
                content: content.trim().to_string(),
            });
        }
        return SplitOutcome {
            entities,
            strategy: SplitStrategy::HeadingPattern,
        };
    }

    fallback_split(markdown, expected_count, kind)
}

fn fallback_split(markdown: &str, expected_count: usize, kind: EntityKind) -> SplitOutcome {
    if markdown.trim().is_empty() || expected_count == 0 {
        return SplitOutcome {
            entities: Vec::new(),
            strategy: SplitStrategy::LineCount,
        };
    }

    let lines: Vec<&str> = markdown.lines().collect();
    let per_chunk = lines.len() / expected_count;
    let mut entities = Vec::with_capacity(expected_count);
    for i in 0..expected_count {
        let start = i * per_chunk;
        let end = if i + 1 == expected_count {
            lines.len()
        } else {
            start + per_chunk
        };
        let number = (i + 1) as u32;
        entities.push(Entity {
            number,
            title: kind.default_title(number),
            content: lines[start..end].join("\n"),
        });
    }

    SplitOutcome {
        entities,
        strategy: SplitStrategy::LineCount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_headings() {
        let outcome = split(
            "### エピソード1「始まり」\nあ\n### エピソード2「終わり」\nい",
            2,
            EntityKind::Episode,
        );
        assert_eq!(outcome.strategy, SplitStrategy::HeadingPattern);
        assert_eq!(
            outcome.entities,
            vec![
                Entity {
                    number: 1,
                    title: "始まり".to_string(),
                    content: "あ".to_string(),
                },
                Entity {
                    number: 2,
                    title: "終わり".to_string(),
                    content: "い".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_match_count_and_number_order() {
        let markdown = (1..=5)
            .map(|n| format!("### エピソード{}「第{}話」\n本文{}\n", n, n, n))
            .collect::<String>();
        let outcome = split(&markdown, 5, EntityKind::Episode);
        assert_eq!(outcome.entities.len(), 5);
        for (i, entity) in outcome.entities.iter().enumerate() {
            assert_eq!(entity.number, (i + 1) as u32);
            assert_eq!(entity.content, format!("本文{}", i + 1));
        }
    }

    #[test]
    fn test_source_order_numbers_are_not_renumbered() {
        let outcome = split(
            "### エピソード3「さん」\nc\n### エピソード1「いち」\na",
            2,
            EntityKind::Episode,
        );
        let numbers: Vec<u32> = outcome.entities.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![3, 1]);
    }

    #[test]
    fn test_act_heading_without_title_gets_default() {
        let outcome = split("## 第1幕\n開幕。\n## 第2幕「対立」\n激化。", 2, EntityKind::Act);
        assert_eq!(outcome.strategy, SplitStrategy::HeadingPattern);
        assert_eq!(outcome.entities[0].title, "第1幕");
        assert_eq!(outcome.entities[0].content, "開幕。");
        assert_eq!(outcome.entities[1].title, "対立");
        assert_eq!(outcome.entities[1].content, "激化。");
    }

    #[test]
    fn test_exact_punctuation_is_required() {
        // ASCII quotes must not trigger the primary strategy.
        let outcome = split("### エピソード1 \"始まり\"\nあ", 1, EntityKind::Episode);
        // The heading still matches (the quoted title is optional), but the
        // ASCII-quoted text stays in the content, not the title.
        assert_eq!(outcome.strategy, SplitStrategy::HeadingPattern);
        assert_eq!(outcome.entities[0].title, "エピソード1");
    }

    #[test]
    fn test_fallback_divides_by_line_count() {
        let markdown = "一\n二\n三\n四\n五\n六\n七";
        let outcome = split(markdown, 3, EntityKind::Episode);
        assert_eq!(outcome.strategy, SplitStrategy::LineCount);
        assert_eq!(outcome.entities.len(), 3);
        assert_eq!(outcome.entities[0].content, "一\n二");
        assert_eq!(outcome.entities[1].content, "三\n四");
        // Remainder goes to the last chunk.
        assert_eq!(outcome.entities[2].content, "五\n六\n七");
        assert_eq!(outcome.entities[0].title, "エピソード1");

        // Contents are non-overlapping and reconstruct the source.
        let joined = outcome
            .entities
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(joined, markdown);
    }

    #[test]
    fn test_fallback_with_fewer_lines_than_expected() {
        let outcome = split("短い", 3, EntityKind::Act);
        assert_eq!(outcome.entities.len(), 3);
        assert_eq!(outcome.entities[0].content, "");
        assert_eq!(outcome.entities[2].content, "短い");
    }

    #[test]
    fn test_empty_input_returns_empty_list() {
        let outcome = split("", 3, EntityKind::Episode);
        assert!(outcome.entities.is_empty());
        let outcome = split("   \n  ", 3, EntityKind::Episode);
        assert!(outcome.entities.is_empty());
    }

    #[test]
    fn test_act_and_episode_grammars_do_not_cross_match() {
        let acts = "## 第1幕「開幕」\n本文";
        assert_eq!(
            split(acts, 1, EntityKind::Episode).strategy,
            SplitStrategy::LineCount
        );
        assert_eq!(
            split(acts, 1, EntityKind::Act).strategy,
            SplitStrategy::HeadingPattern
        );
    }

    #[test]
    fn test_heading_only_entity_has_empty_content() {
        let outcome = split("### エピソード1「孤島」", 1, EntityKind::Episode);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].content, "");
    }
}
