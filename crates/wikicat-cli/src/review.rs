//! Terminal review surface

use std::io::{BufRead, Write};
use wikicat_core::errors::{ExError, ExErrorKind, Result};
use wikicat_core::review::{ConfirmationRequest, ConfirmationResponse, ReviewSurface};
use wikicat_core::rules::DedupePolicy;

const HELP: &str = "[y]es [n]o [e]dit [a]pprove template [s]kip template [l]eft/[r]ight/[k]eep-both dedupe [q]uit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Apply,
    Skip,
    Edit,
    ApproveTemplate,
    SkipTemplate,
    Dedupe(DedupePolicy),
    Quit,
}

fn parse_answer(line: &str) -> Option<Answer> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(Answer::Apply),
        "" | "n" | "no" => Some(Answer::Skip),
        "e" | "edit" => Some(Answer::Edit),
        "a" => Some(Answer::ApproveTemplate),
        "s" => Some(Answer::SkipTemplate),
        "l" => Some(Answer::Dedupe(DedupePolicy::Left)),
        "r" => Some(Answer::Dedupe(DedupePolicy::Right)),
        "k" => Some(Answer::Dedupe(DedupePolicy::KeepBoth)),
        "q" | "quit" => Some(Answer::Quit),
        _ => None,
    }
}

/// Prompts on `output` and reads answers line by line from `input`
pub struct TerminalReviewSurface<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalReviewSurface<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn unavailable(reason: impl std::fmt::Display) -> ExError {
        ExError::new(ExErrorKind::ReviewUnavailable)
            .with_op("terminal_review")
            .with_message(reason.to_string())
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(Self::unavailable)?;
        if read == 0 {
            return Err(Self::unavailable("input closed"));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn show(&mut self, request: &ConfirmationRequest) -> std::io::Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        write!(out, "{} | {}", request.page, request.template)?;
        if request.partial {
            write!(out, " [partial]")?;
        }
        writeln!(out)?;
        writeln!(out, "  {} → {}", request.old_value, request.new_value)?;
        writeln!(out, "- {}", request.fragment)?;
        writeln!(out, "+ {}", request.proposed)?;
        if request.has_duplicates() {
            let positions: Vec<String> = request.duplicates.iter().map(usize::to_string).collect();
            writeln!(out, "  duplicate positions: {}", positions.join(", "))?;
        }
        writeln!(out, "{}", HELP)?;
        write!(out, "> ")?;
        out.flush()
    }
}

impl<R, W> ReviewSurface for TerminalReviewSurface<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn review(&mut self, request: &ConfirmationRequest) -> Result<ConfirmationResponse> {
        self.show(request).map_err(Self::unavailable)?;
        let id = request.id.clone();
        loop {
            let line = self.read_line()?;
            let Some(answer) = parse_answer(&line) else {
                write!(self.output, "{}\n> ", HELP).map_err(Self::unavailable)?;
                self.output.flush().map_err(Self::unavailable)?;
                continue;
            };
            return Ok(match answer {
                Answer::Apply => ConfirmationResponse::apply(id),
                Answer::Skip => ConfirmationResponse::skip(id),
                Answer::ApproveTemplate => ConfirmationResponse::apply(id).confirm_all(),
                Answer::SkipTemplate => ConfirmationResponse::skip(id).skip_all(),
                Answer::Dedupe(policy) => ConfirmationResponse::apply(id).with_dedupe(policy),
                Answer::Quit => ConfirmationResponse::cancel(id),
                Answer::Edit => {
                    write!(self.output, "edited invocation: ").map_err(Self::unavailable)?;
                    self.output.flush().map_err(Self::unavailable)?;
                    let edited = self.read_line()?;
                    if edited.trim().is_empty() {
                        ConfirmationResponse::apply(id)
                    } else {
                        ConfirmationResponse::apply(id).with_edited(edited)
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use wikicat_core::review::ReviewAction;
    use wikicat_core_types::RequestId;

    fn request(duplicates: Vec<usize>) -> ConfirmationRequest {
        ConfirmationRequest {
            id: RequestId::new(),
            page: "Page".to_string(),
            template: "Cats".to_string(),
            fragment: "{{Cats|Old Topic|New Topic}}".to_string(),
            proposed: "{{Cats|New Topic|New Topic}}".to_string(),
            old_value: "Old Topic".to_string(),
            new_value: "New Topic".to_string(),
            duplicates,
            partial: false,
        }
    }

    fn answer(input: &str, req: &ConfirmationRequest) -> (Result<ConfirmationResponse>, String) {
        let mut surface = TerminalReviewSurface::new(Cursor::new(input.to_string()), Vec::new());
        let response = surface.review(req);
        (response, String::from_utf8(surface.output).unwrap())
    }

    #[test]
    fn test_prompt_shows_diff_and_duplicates() {
        let req = request(vec![1, 2]);
        let (response, shown) = answer("l\n", &req);
        let response = response.unwrap();
        assert_eq!(response.action, ReviewAction::Apply);
        assert_eq!(response.dedupe, Some(DedupePolicy::Left));
        assert_eq!(response.id, req.id);
        assert!(shown.contains("- {{Cats|Old Topic|New Topic}}"));
        assert!(shown.contains("duplicate positions: 1, 2"));
    }

    #[test]
    fn test_unknown_answer_reprompts() {
        let req = request(Vec::new());
        let (response, shown) = answer("what\ns\n", &req);
        let response = response.unwrap();
        assert_eq!(response.action, ReviewAction::Skip);
        assert!(response.auto_skip_all);
        assert_eq!(shown.matches(HELP).count(), 2);
    }

    #[test]
    fn test_edit_reads_fragment() {
        let req = request(Vec::new());
        let (response, _) = answer("e\n{{Cats|Newer}}\n", &req);
        assert_eq!(response.unwrap().edited_fragment.as_deref(), Some("{{Cats|Newer}}"));
    }

    #[test]
    fn test_closed_input_is_unavailable() {
        let (response, _) = answer("", &request(Vec::new()));
        assert_eq!(response.unwrap_err().kind(), ExErrorKind::ReviewUnavailable);
    }

    #[test]
    fn test_answer_keywords() {
        assert_eq!(parse_answer(" Y "), Some(Answer::Apply));
        assert_eq!(parse_answer(""), Some(Answer::Skip));
        assert_eq!(parse_answer("a"), Some(Answer::ApproveTemplate));
        assert_eq!(parse_answer("q"), Some(Answer::Quit));
        assert_eq!(parse_answer("x"), None);
    }
}
