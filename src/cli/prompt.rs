use std::io::{BufRead, Write};

use crate::error::{Result, ScraperError};

/// Invalid answers tolerated before a count question gives up.
const MAX_TRIES: usize = 3;

/// Operator I/O: questions and messages go to `output`, answers come from `input`.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, message: impl AsRef<str>) -> Result<()> {
        writeln!(self.output, "{}", message.as_ref())?;
        self.output.flush()?;
        Ok(())
    }

    /// Print `question` and read one trimmed line. End of input is an error.
    pub fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{} ", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ScraperError::Input("input closed before an answer was given".to_string()));
        }
        Ok(line.trim().to_string())
    }

    /// Ask for a positive integer, at most `max` when given. Re-asks on bad answers.
    pub fn ask_count(&mut self, question: &str, max: Option<usize>) -> Result<usize> {
        for _ in 0..MAX_TRIES {
            let answer = self.ask(question)?;
            match answer.parse::<usize>() {
                Ok(0) | Err(_) => self.say("Please enter a positive whole number.")?,
                Ok(n) => match max {
                    Some(max) if n > max => self.say(format!("Please enter a number no larger than {}.", max))?,
                    _ => return Ok(n),
                },
            }
        }
        Err(ScraperError::Input(format!("no valid answer to {:?}", question)))
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn count_reprompts_until_valid() {
        let mut p = prompter("abc\n0\n7\n");
        assert_eq!(p.ask_count("How many?", None).unwrap(), 7);
        let out = String::from_utf8(p.into_output()).unwrap();
        assert_eq!(out.matches("How many?").count(), 3);
    }

    #[test]
    fn count_respects_upper_bound() {
        let mut p = prompter("9\n4\n");
        assert_eq!(p.ask_count("How many?", Some(5)).unwrap(), 4);
        let out = String::from_utf8(p.into_output()).unwrap();
        assert!(out.contains("no larger than 5"));
    }

    #[test]
    fn gives_up_after_repeated_bad_answers() {
        let mut p = prompter("x\ny\nz\n4\n");
        assert!(matches!(p.ask_count("How many?", None), Err(ScraperError::Input(_))));
    }

    #[test]
    fn end_of_input_is_an_error() {
        let mut p = prompter("");
        assert!(matches!(p.ask("Site?"), Err(ScraperError::Input(_))));
    }
}
