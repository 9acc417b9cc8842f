use crate::app::{Proceed, WorkflowError, WorkflowReport};
use crate::chain::{self, ChangeMetric};
use anyhow::Result;
use crossterm::style::Stylize;
use std::io::{self, BufRead, Write};

/// Everything a prompt needs to present a threshold crossing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub metric: ChangeMetric,
    pub threshold: u64,
    /// Default base name offered on the trunk
    pub suggested_branch: Option<String>,
    /// Working-tree files available for the commit
    pub changed_files: Vec<String>,
}

impl PromptRequest {
    pub fn on_root_branch(&self) -> bool {
        chain::is_root_branch(&self.metric.branch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse {
    IncreaseThreshold,
    Cancel,
    Proceed(Proceed),
}

/// The interactive side of a threshold crossing
pub trait Prompt {
    fn ask(&mut self, request: &PromptRequest) -> Result<PromptResponse>;

    fn report(&mut self, outcome: &std::result::Result<WorkflowReport, WorkflowError>);
}

/// Line-based prompt over a reader/writer pair (stdin/stdout in the binary)
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompt<io::BufReader<io::Stdin>, io::Stdout> {
    pub fn stdio() -> Self {
        TerminalPrompt::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

enum Choice {
    Proceed,
    Increase,
    Cancel,
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        TerminalPrompt { input, output }
    }

    fn read_line(&mut self, label: &str) -> Result<String> {
        write!(self.output, "{} ", label.bold())?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            anyhow::bail!("prompt input closed");
        }
        Ok(line.trim().to_string())
    }

    fn ask_choice(&mut self) -> Result<Choice> {
        loop {
            let answer = self.read_line("[p]roceed / [i]ncrease threshold / [c]ancel:")?;
            match answer.to_lowercase().as_str() {
                "p" | "proceed" => return Ok(Choice::Proceed),
                "i" | "increase" => return Ok(Choice::Increase),
                "c" | "cancel" | "" => return Ok(Choice::Cancel),
                other => writeln!(self.output, "Unknown choice '{}'", other)?,
            }
        }
    }

    fn ask_branch_name(&mut self, suggested: Option<&str>) -> Result<String> {
        let label = match suggested {
            Some(s) => format!("Branch name [{}]:", s),
            None => "Branch name:".to_string(),
        };
        let answer = self.read_line(&label)?;
        Ok(match (answer.is_empty(), suggested) {
            (true, Some(s)) => s.to_string(),
            _ => answer,
        })
    }

    fn ask_files(&mut self, files: &[String]) -> Result<Vec<String>> {
        for (i, file) in files.iter().enumerate() {
            writeln!(self.output, "  {:>3}  {}", i + 1, file)?;
        }
        loop {
            let answer = self.read_line("Files to commit (all, or e.g. 1,3):")?;
            match select_files(files, &answer) {
                Some(selected) => return Ok(selected),
                None => writeln!(self.output, "{}", "Invalid selection".red())?,
            }
        }
    }
}

/// Parse a selection: blank or "all" picks everything, otherwise 1-based indices
pub fn select_files(files: &[String], answer: &str) -> Option<Vec<String>> {
    let answer = answer.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("all") {
        return Some(files.to_vec());
    }

    let mut selected = Vec::new();
    for part in answer.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let idx: usize = part.parse().ok()?;
        let file = files.get(idx.checked_sub(1)?)?;
        if !selected.contains(file) {
            selected.push(file.clone());
        }
    }
    Some(selected)
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn ask(&mut self, request: &PromptRequest) -> Result<PromptResponse> {
        let m = &request.metric;
        writeln!(self.output)?;
        writeln!(
            self.output,
            "{} {} changed lines on {} (threshold {})",
            "▲".yellow(),
            m.total.to_string().bold(),
            m.branch.as_str().cyan(),
            request.threshold
        )?;
        if !m.is_root() {
            writeln!(
                self.output,
                "    {} since {} + {} uncommitted",
                m.branch_portion, m.parent, m.working_portion
            )?;
        }

        match self.ask_choice()? {
            Choice::Proceed => {}
            Choice::Increase => return Ok(PromptResponse::IncreaseThreshold),
            Choice::Cancel => return Ok(PromptResponse::Cancel),
        }

        let branch_name = if request.on_root_branch() {
            Some(self.ask_branch_name(request.suggested_branch.as_deref())?)
        } else {
            None
        };
        let files = self.ask_files(&request.changed_files)?;
        let message = self.read_line("Commit message:")?;

        Ok(PromptResponse::Proceed(Proceed {
            branch_name,
            files,
            message,
        }))
    }

    fn report(&mut self, outcome: &std::result::Result<WorkflowReport, WorkflowError>) {
        let line = match outcome {
            Ok(report) => format!("{} {}", "✓".green(), report.message()),
            Err(e) => format!("{} {}", "✗".red(), e),
        };
        if let Err(e) = writeln!(self.output, "{}", line) {
            log::warn!("Could not write workflow result: {}", e);
        }
    }
}
