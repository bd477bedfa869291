use std::io::{BufRead, Write};

use crate::survey::*;

/// A choice given by its number (starting at 1) or by its label.
fn parse_selection(input: &str, choices: &[String]) -> Option<String> {
    let s = input.trim();
    if let Ok(n) = s.parse::<usize>() {
        return n.checked_sub(1).and_then(|idx| choices.get(idx)).cloned();
    }
    choices.iter().find(|c| c.eq_ignore_ascii_case(s)).cloned()
}

/// Asks the questions that have no answer yet, one at a time.
pub fn ask_remaining<R: BufRead, W: Write>(
    session: &mut QuizSession,
    input: &mut R,
    output: &mut W,
) -> SurveyResult<()> {
    let questions: Vec<Question> = session.questions().to_vec();
    let total = questions.len();
    for (idx, q) in questions.iter().enumerate() {
        if session.answers().contains_key(&q.id) {
            continue;
        }
        loop {
            writeln!(output, "\nQuestion {} of {}: {}", idx + 1, total, q.text)
                .context(WritingOutputSnafu {})?;
            for (cidx, c) in q.choices.iter().enumerate() {
                writeln!(output, "  {}) {}", cidx + 1, c).context(WritingOutputSnafu {})?;
            }
            write!(output, "Your answer: ").context(WritingOutputSnafu {})?;
            output.flush().context(WritingOutputSnafu {})?;

            let mut line = String::new();
            let num_read = input.read_line(&mut line).context(ReadingInputSnafu {})?;
            if num_read == 0 {
                whatever!(
                    "The quiz ended with {} unanswered questions",
                    session.remaining().len()
                )
            }
            match parse_selection(&line, &q.choices) {
                Some(label) => {
                    debug!("ask_remaining: {} -> {:?}", q.id, label);
                    session.answer(q.id, &label).context(QuizSnafu {})?;
                    break;
                }
                None => {
                    writeln!(
                        output,
                        "Please answer with a number between 1 and {}, or with the text of a choice.",
                        q.choices.len()
                    )
                    .context(WritingOutputSnafu {})?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn selections() {
        let choices: Vec<String> = ["soda", "pop", "coke"].iter().map(|s| s.to_string()).collect();
        assert_eq!(parse_selection("2\n", &choices), Some("pop".to_string()));
        assert_eq!(parse_selection(" COKE ", &choices), Some("coke".to_string()));
        assert_eq!(parse_selection("0", &choices), None);
        assert_eq!(parse_selection("4", &choices), None);
        assert_eq!(parse_selection("tonic", &choices), None);
    }

    #[test]
    fn interactive_quiz() {
        let mut session = QuizSession::new();
        session.answer(303, "frappe").unwrap();
        // One invalid answer, then the first choice of the 9 remaining questions.
        let mut answers = String::from("42\n");
        for _ in 0..9 {
            answers.push_str("1\n");
        }
        let mut input = Cursor::new(answers.into_bytes());
        let mut output: Vec<u8> = Vec::new();
        ask_remaining(&mut session, &mut input, &mut output).unwrap();
        assert!(session.is_complete());
        assert_eq!(session.answers().get(&300).map(|s| s.as_str()), Some("berm"));

        let text = String::from_utf8(output).unwrap();
        assert!(!text.contains("Question 1 of 10"));
        assert!(text.contains("Question 2 of 10: Grass between sidewalk + road?"));
        assert!(text.contains("Please answer with a number between 1 and 8"));
    }

    #[test]
    fn end_of_input() {
        let mut session = QuizSession::new();
        let mut input = Cursor::new(b"frappe\n".to_vec());
        let mut output: Vec<u8> = Vec::new();
        let err = ask_remaining(&mut session, &mut input, &mut output).unwrap_err();
        assert!(err.to_string().contains("9 unanswered questions"));
        assert_eq!(session.answers().len(), 1);
    }
}
