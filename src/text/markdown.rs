//! Minimal markdown styling for streamed model output: only the
//! `**bold**` emphasis pair is interpreted, everything else passes
//! through verbatim.

use serde::Serialize;

/// Display style of one run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStyle {
    Plain,
    Bold,
}

/// A contiguous run of text sharing one style. Runs are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyledRun {
    pub style: RunStyle,
    pub text: String,
}

impl StyledRun {
    fn plain(text: &str) -> Self {
        Self {
            style: RunStyle::Plain,
            text: text.to_string(),
        }
    }

    fn bold(text: &str) -> Self {
        Self {
            style: RunStyle::Bold,
            text: text.to_string(),
        }
    }
}

const DELIMITER: &str = "**";

/// Split `input` into styled runs.
///
/// Delimiters pair greedily left to right. An unmatched trailing `**`
/// is literal text: rendering never loses characters other than the
/// consumed delimiter pairs, so concatenating the runs of
/// `render_markdown(s)` reproduces `s` minus its paired `**` markers.
pub fn render_markdown(input: &str) -> Vec<StyledRun> {
    let mut runs = Vec::new();
    let mut rest = input;

    while let Some(open) = rest.find(DELIMITER) {
        let after_open = &rest[open + DELIMITER.len()..];
        let Some(close) = after_open.find(DELIMITER) else {
            // Unmatched opener: everything left is literal.
            break;
        };

        if open > 0 {
            runs.push(StyledRun::plain(&rest[..open]));
        }
        // An empty pair (`****`) styles nothing and emits no run.
        if close > 0 {
            runs.push(StyledRun::bold(&after_open[..close]));
        }
        rest = &after_open[close + DELIMITER.len()..];
    }

    if !rest.is_empty() {
        runs.push(StyledRun::plain(rest));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_single_run() {
        assert_eq!(render_markdown("no markup here"), vec![StyledRun::plain("no markup here")]);
    }

    #[test]
    fn bold_span_splits_into_three_runs() {
        assert_eq!(
            render_markdown("a **b** c"),
            vec![
                StyledRun::plain("a "),
                StyledRun::bold("b"),
                StyledRun::plain(" c"),
            ]
        );
    }

    #[test]
    fn multiple_bold_spans_pair_left_to_right() {
        assert_eq!(
            render_markdown("**x**y**z**"),
            vec![
                StyledRun::bold("x"),
                StyledRun::plain("y"),
                StyledRun::bold("z"),
            ]
        );
    }

    #[test]
    fn unmatched_delimiter_stays_literal() {
        assert_eq!(
            render_markdown("broken **bold"),
            vec![StyledRun::plain("broken **bold")]
        );
        assert_eq!(
            render_markdown("**a** then **"),
            vec![
                StyledRun::bold("a"),
                StyledRun::plain(" then **"),
            ]
        );
    }

    #[test]
    fn empty_pair_emits_no_run() {
        assert_eq!(render_markdown("a****b"), vec![StyledRun::plain("a"), StyledRun::plain("b")]);
    }

    #[test]
    fn empty_input_yields_no_runs() {
        assert!(render_markdown("").is_empty());
    }

    #[test]
    fn runs_reconstruct_input_without_paired_markers() {
        let input = "intro **one** mid **two** outro";
        let rebuilt: String = render_markdown(input).into_iter().map(|r| r.text).collect();
        assert_eq!(rebuilt, "intro one mid two outro");
    }
}
