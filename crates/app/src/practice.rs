use prep_core::model::{Explanation, OptionId, SessionSummary, format_elapsed};
use services::session::{SessionPhase, TickHandle, TickOutcome, TokioScheduler};
use services::{
    AdvanceOutcome, SessionController, SessionError, SessionEvent, SessionLoopService,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedSender};

/// One learner command read from stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Submit,
    Next,
    Pause,
    Resume,
    Stop,
    Confirm(bool),
    Select(String),
    Empty,
}

impl Input {
    fn parse(line: &str, confirming: bool) -> Self {
        let line = line.trim();
        if confirming {
            match line.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Self::Confirm(true),
                "n" | "no" => return Self::Confirm(false),
                _ => {}
            }
        }
        match line {
            "" => Self::Empty,
            "s" => Self::Submit,
            "n" => Self::Next,
            "p" => Self::Pause,
            "r" => Self::Resume,
            "q" => Self::Stop,
            other => Self::Select(other.to_owned()),
        }
    }
}

/// Drive a session from stdin until it completes or input closes.
pub async fn run_session(
    loop_svc: &SessionLoopService,
    mut session: SessionController,
) -> Result<Option<SessionSummary>, Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = TokioScheduler::new(Handle::current());
    let ticker: TickHandle = loop_svc.spawn_ticker(&scheduler, tx.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    print_question(&session);

    while !session.is_complete() {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!(session = %session.id(), "input closed; leaving session");
                    break;
                };
                let input = Input::parse(&line, session.stop_requested());
                if let Err(err) = handle_input(loop_svc, &mut session, input, &tx).await {
                    println!("  ! {err}");
                }
            }
            Some(event) = rx.recv() => {
                if let Err(err) = handle_event(loop_svc, &mut session, event).await {
                    println!("  ! {err}");
                }
            }
        }
    }

    ticker.cancel();
    Ok(session.summary().cloned())
}

async fn handle_input(
    loop_svc: &SessionLoopService,
    session: &mut SessionController,
    input: Input,
    events: &UnboundedSender<SessionEvent>,
) -> Result<(), SessionError> {
    match input {
        Input::Empty => {}
        Input::Select(raw) => {
            session.select(OptionId::new(raw))?;
            if let Some(selected) = session.selected() {
                println!("  selected {selected}; press s to submit");
            }
        }
        Input::Submit => {
            loop_svc.spawn_evaluation(session, events.clone())?;
            println!("  checking answer...");
        }
        Input::Next => match loop_svc.advance(session).await? {
            AdvanceOutcome::Next => print_question(session),
            AdvanceOutcome::Completed(_) => {}
        },
        Input::Pause => {
            if session.pause()? {
                println!("  paused; press r to resume");
            }
        }
        Input::Resume => {
            if session.resume()? {
                println!("  resumed");
                if session.phase() == SessionPhase::Selecting {
                    print_question(session);
                }
            }
        }
        Input::Stop => {
            session.request_stop()?;
            println!("  end the session now and save your progress? (y/n)");
        }
        Input::Confirm(true) => {
            loop_svc.confirm_stop(session).await?;
        }
        Input::Confirm(false) => {
            session.cancel_stop();
            println!("  continuing");
        }
    }
    Ok(())
}

async fn handle_event(
    loop_svc: &SessionLoopService,
    session: &mut SessionController,
    event: SessionEvent,
) -> Result<(), SessionError> {
    match event {
        SessionEvent::Tick => match loop_svc.tick(session).await? {
            TickOutcome::Counted { remaining } if remaining % 60 == 0 || remaining <= 10 => {
                println!("  time left {}", format_remaining(remaining));
            }
            TickOutcome::Expired(_) => println!("  time is up"),
            _ => {}
        },
        SessionEvent::Evaluated { request, outcome } => {
            let result = match loop_svc.finish_submit(session, &request, outcome) {
                Ok(result) => result,
                Err(SessionError::Completed) => return Ok(()),
                Err(err) if err.is_retryable() => {
                    println!("  could not check the answer ({err}); press s to retry");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };
            if result.correct {
                println!("  correct!");
            } else {
                println!("  incorrect; the answer was {}", result.correct_answer);
            }
            if let Some(explanation) = session.explanation() {
                for line in explanation_lines(explanation) {
                    println!("{line}");
                }
            }
            let progress = session.progress();
            let hint = if session.is_paused() {
                "paused; press r to resume"
            } else {
                "press n for the next question"
            };
            println!("  score {}/{}; {hint}", progress.score, progress.answered);
        }
    }
    Ok(())
}

fn explanation_lines(explanation: &Explanation) -> Vec<String> {
    let mut lines = Vec::new();
    if !explanation.concept.is_empty() {
        lines.push(format!("  concept: {}", explanation.concept));
    }
    for (n, step) in explanation.reasoning.iter().enumerate() {
        lines.push(format!("    {}. {step}", n + 1));
    }
    if !explanation.bias_check.is_empty() {
        lines.push(format!("  bias check: {}", explanation.bias_check));
    }
    if !explanation.reflection.is_empty() {
        lines.push(format!("  reflect: {}", explanation.reflection));
    }
    if !explanation.sources.is_empty() {
        lines.push(format!("  sources: {}", explanation.sources.join("; ")));
    }
    lines
}

fn format_remaining(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn print_help() {
    println!("Type an option id to select it, then:");
    println!("  s submit   n next   p pause   r resume   q stop");
}

fn print_question(session: &SessionController) {
    let Some(question) = session.current_question() else {
        return;
    };
    let progress = session.progress();
    let timer = progress
        .remaining_seconds
        .map(|secs| format!("  [{}]", format_remaining(secs)))
        .unwrap_or_default();
    println!();
    println!(
        "Question {} of {} ({}% complete){timer}",
        progress.position, progress.total, progress.percent
    );
    println!("{}", question.prompt());
    for option in question.options() {
        println!("  {}) {}", option.id, option.text);
    }
    if !question.is_answerable() {
        println!("  (this question has no options; press q to stop)");
    }
}

pub fn print_summary(summary: &SessionSummary) {
    println!();
    if summary.timed_out() {
        println!("Time's up!");
    } else {
        println!("Session complete ({})", summary.reason().as_str());
    }
    println!(
        "Score {}/{} ({}%), {} answered, {} incorrect, time {}",
        summary.score(),
        summary.total(),
        summary.accuracy_percent(),
        summary.answered(),
        summary.incorrect(),
        format_elapsed(summary.elapsed())
    );
    println!("results?{}", summary.to_results_query());
}
