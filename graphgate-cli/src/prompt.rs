//! Interactive approval prompt for `graphgate approval grant`.
//!
//! Shown when no `--decision` flag is given. The approver sees what the
//! request token binds before choosing:
//! - a: approve
//! - r: reject

use std::io::{self, BufRead, Write};

use chrono::{DateTime, Utc};
use graphgate_core::{ApprovalDecision, ApprovalRequestClaims};

/// Trait for approval prompt implementations
pub trait DecisionPrompter: Send + Sync {
    /// Ask for a decision on `request`. `None` means the approver aborted.
    fn prompt(&self, request: &ApprovalRequestClaims, now: DateTime<Utc>)
        -> io::Result<Option<ApprovalDecision>>;

    /// Human-readable name for this prompter
    fn name(&self) -> &'static str;
}

/// Prompts on the terminal: details and choices on stderr, answer from stdin.
pub struct TerminalPrompter;

impl DecisionPrompter for TerminalPrompter {
    fn name(&self) -> &'static str {
        "TerminalPrompter"
    }

    fn prompt(
        &self,
        request: &ApprovalRequestClaims,
        now: DateTime<Utc>,
    ) -> io::Result<Option<ApprovalDecision>> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        prompt_decision(request, now, &mut input, &mut io::stderr())
    }
}

/// Run the prompt against arbitrary input and output streams.
///
/// Loops until a recognized answer is read. End of input aborts.
pub fn prompt_decision<R: BufRead, W: Write>(
    request: &ApprovalRequestClaims,
    now: DateTime<Utc>,
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<ApprovalDecision>> {
    print_request(request, now, out)?;

    writeln!(out, "\nApproval decision:")?;
    writeln!(out, "  a  approve")?;
    writeln!(out, "  r  reject")?;

    loop {
        write!(out, "\nChoice: ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(None);
        }

        match line.trim().to_lowercase().as_str() {
            "a" | "approve" | "approved" | "y" | "yes" => {
                writeln!(out, "  approved")?;
                return Ok(Some(ApprovalDecision::Approved));
            }
            "r" | "reject" | "rejected" | "n" | "no" => {
                writeln!(out, "  rejected")?;
                return Ok(Some(ApprovalDecision::Rejected));
            }
            "" => continue,
            _ => writeln!(out, "Invalid choice. Use a/r")?,
        }
    }
}

fn print_request<W: Write>(
    request: &ApprovalRequestClaims,
    now: DateTime<Utc>,
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "\nApproval requested")?;
    writeln!(out, "  principal    {}", request.principal)?;
    writeln!(out, "  command      {}", request.command)?;
    writeln!(
        out,
        "  workspace    {}/{}",
        request.org_name, request.workspace_name
    )?;
    writeln!(out, "  fingerprint  {}", request.fingerprint)?;
    writeln!(out, "  requested    {}", request.requested_at.to_rfc3339())?;

    let remaining = request.request_expires_at - now;
    if remaining > chrono::Duration::zero() {
        let remaining = remaining.to_std().unwrap_or_default();
        writeln!(
            out,
            "  expires      {} (in {})",
            request.request_expires_at.to_rfc3339(),
            humantime::format_duration(std::time::Duration::from_secs(remaining.as_secs()))
        )
    } else {
        writeln!(
            out,
            "  expires      {} (expired)",
            request.request_expires_at.to_rfc3339()
        )
    }
}
