//! Command-line front end.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use helpdesk_domain::{Ticket, TicketId, TicketStats};
use helpdesk_sync::TicketViewSnapshot;
use time::format_description::well_known::Rfc3339;

use crate::admin_desk::AdminDesk;
use crate::bootstrap::HelpdeskRuntime;
use crate::intake::TicketForm;

/// How long `submit` keeps the process alive for the confirmation email.
const CONFIRMATION_WAIT: Duration = Duration::from_secs(20);

#[derive(Parser, Debug)]
#[command(name = "helpdesk")]
#[command(version)]
#[command(about = "Support ticket helpdesk")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open a new support ticket
    Submit {
        #[arg(long)]
        email: String,

        #[arg(long, default_value = "")]
        subject: String,

        #[arg(short, long)]
        message: String,

        /// Print an assistant-suggested rewording instead of submitting
        #[arg(long)]
        suggest: bool,
    },

    /// Show a ticket by id
    Track {
        ticket_id: String,

        /// Keep printing updates until the ticket is closed
        #[arg(long)]
        follow: bool,
    },

    /// Reply to a ticket as the customer
    Reply {
        ticket_id: String,

        #[arg(short, long)]
        message: String,
    },

    /// Admin console
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    /// List all tickets
    List {
        /// Only tickets waiting on an admin reply
        #[arg(long)]
        needs_reply: bool,
    },

    /// Search tickets by id, subject or email
    Search {
        query: String,

        #[arg(long)]
        needs_reply: bool,
    },

    /// Print ticket counts
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Show one ticket with its full conversation
    Show { ticket_id: String },

    /// Reply to a ticket as the admin
    Reply {
        ticket_id: String,

        #[arg(short, long)]
        message: String,
    },

    /// Close a ticket
    Close { ticket_id: String },
}

fn parse_ticket_id(raw: &str) -> Result<TicketId> {
    TicketId::from_user_input(raw).context("ticket id cannot be blank")
}

pub async fn run(cli: Cli, runtime: &HelpdeskRuntime) -> Result<()> {
    match cli.command {
        Command::Submit {
            email,
            subject,
            message,
            suggest,
        } => {
            let form = TicketForm {
                email,
                subject,
                message,
            };
            let intake = runtime.intake();
            if suggest {
                let suggestion = intake.suggest_message(&form).await?;
                println!("{suggestion}");
                return Ok(());
            }
            let mut receipt = intake.submit(&form).await?;
            println!("Ticket created: {}", receipt.ticket_id());
            println!("{}", receipt.notice());
            receipt.wait_for_confirmation(CONFIRMATION_WAIT).await;
        }
        Command::Track { ticket_id, follow } => {
            let tracker = runtime.tracker();
            let view = tracker.track(parse_ticket_id(&ticket_id)?).await?;
            print!("{}", render_view(&view));
            if follow {
                let mut updates = tracker.subscribe();
                while !updates.borrow_and_update().is_closed() {
                    if updates.changed().await.is_err() {
                        break;
                    }
                    print!("{}", render_view(&updates.borrow()));
                }
            }
            tracker.stop().await;
        }
        Command::Reply { ticket_id, message } => {
            let composer = runtime.user_composer();
            composer
                .tracker()
                .track(parse_ticket_id(&ticket_id)?)
                .await?;
            let ticket = composer.submit_text(message).await?;
            composer.tracker().stop().await;
            print!("{}", render_ticket(&ticket));
        }
        Command::Admin { command } => {
            let desk = runtime.admin_desk();
            let result = run_admin(command, &desk).await;
            desk.shutdown().await;
            result?;
        }
    }
    Ok(())
}

async fn run_admin(command: AdminCommand, desk: &AdminDesk) -> Result<()> {
    match command {
        AdminCommand::List { needs_reply } => {
            desk.load().await?;
            let tickets = if needs_reply {
                desk.needs_reply_only("")
            } else {
                desk.search("")
            };
            print!("{}", render_ticket_table(&tickets));
        }
        AdminCommand::Search { query, needs_reply } => {
            desk.load().await?;
            let tickets = if needs_reply {
                desk.needs_reply_only(&query)
            } else {
                desk.search(&query)
            };
            print!("{}", render_ticket_table(&tickets));
        }
        AdminCommand::Stats { json } => {
            let stats = desk.load().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", render_stats(&stats));
            }
        }
        AdminCommand::Show { ticket_id } => {
            let view = desk.open_ticket(parse_ticket_id(&ticket_id)?).await?;
            print!("{}", render_view(&view));
        }
        AdminCommand::Reply { ticket_id, message } => {
            desk.open_ticket(parse_ticket_id(&ticket_id)?).await?;
            let ticket = desk.reply(message).await?;
            print!("{}", render_ticket(&ticket));
        }
        AdminCommand::Close { ticket_id } => {
            let ticket_id = parse_ticket_id(&ticket_id)?;
            let outcome = desk.close_ticket(&ticket_id).await?;
            if outcome.was_already_closed() {
                println!("Ticket {ticket_id} was already closed.");
            } else {
                println!("Ticket {ticket_id} closed.");
            }
        }
    }
    Ok(())
}

pub fn render_stats(stats: &TicketStats) -> String {
    format!(
        "total: {}  open: {}  pending: {}  closed: {}",
        stats.total, stats.open, stats.pending, stats.closed
    )
}

pub fn render_ticket_table(tickets: &[Ticket]) -> String {
    if tickets.is_empty() {
        return "No tickets.\n".to_owned();
    }
    let mut out = String::new();
    for ticket in tickets {
        let _ = writeln!(
            out,
            "{:<14} {:<8} {:<28} {}",
            ticket.ticket_id.as_str(),
            ticket.label().as_str(),
            ticket.email,
            ticket.subject_or_placeholder()
        );
    }
    out
}

pub fn render_ticket(ticket: &Ticket) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} [{}] {}",
        ticket.ticket_id,
        ticket.label().as_str(),
        ticket.subject_or_placeholder()
    );
    let _ = writeln!(out, "from: {}", ticket.email);
    for message in &ticket.messages {
        let at = message
            .created_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| message.created_at.to_string());
        let _ = writeln!(out, "  {at} {}: {}", message.sender.as_str(), message.message);
    }
    out
}

pub fn render_view(view: &TicketViewSnapshot) -> String {
    let Some(ticket) = &view.ticket else {
        return "No ticket loaded.\n".to_owned();
    };
    let mut out = render_ticket(ticket);
    if let Some(error) = &view.last_sync_error {
        let _ = writeln!(out, "(last refresh failed: {error})");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_domain::Sender;
    use time::macros::datetime;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).expect("parse cli")
    }

    #[test]
    fn parses_customer_commands() {
        assert_eq!(
            parse(&["helpdesk", "submit", "--email", "a@b.com", "-m", "help"]).command,
            Command::Submit {
                email: "a@b.com".to_owned(),
                subject: String::new(),
                message: "help".to_owned(),
                suggest: false,
            }
        );
        assert_eq!(
            parse(&["helpdesk", "track", "TKT-1", "--follow"]).command,
            Command::Track {
                ticket_id: "TKT-1".to_owned(),
                follow: true,
            }
        );
    }

    #[test]
    fn parses_admin_commands() {
        assert_eq!(
            parse(&["helpdesk", "admin", "search", "vpn", "--needs-reply"]).command,
            Command::Admin {
                command: AdminCommand::Search {
                    query: "vpn".to_owned(),
                    needs_reply: true,
                },
            }
        );
        assert_eq!(
            parse(&["helpdesk", "admin", "close", "TKT-9"]).command,
            Command::Admin {
                command: AdminCommand::Close {
                    ticket_id: "TKT-9".to_owned(),
                },
            }
        );
        assert_eq!(
            parse(&["helpdesk", "admin", "stats", "--json"]).command,
            Command::Admin {
                command: AdminCommand::Stats { json: true },
            }
        );
        assert!(Cli::try_parse_from(["helpdesk", "admin", "reply", "TKT-9"]).is_err());
    }

    #[test]
    fn ticket_ids_are_trimmed_and_never_blank() {
        assert_eq!(
            parse_ticket_id("  TKT-1 ").expect("ticket id"),
            TicketId::new("TKT-1")
        );
        assert!(parse_ticket_id("   ").is_err());
    }

    #[test]
    fn renders_conversation_and_stats() {
        let mut ticket = Ticket::open(
            TicketId::new("TKT-1"),
            "a@b.com",
            None,
            "cannot sign in",
            datetime!(2026-03-01 10:00 UTC),
        )
        .expect("open");
        ticket
            .reply(Sender::Admin, "reset sent", datetime!(2026-03-01 10:05 UTC))
            .expect("reply");

        let rendered = render_ticket(&ticket);
        assert!(rendered.contains("from: a@b.com"));
        assert!(rendered.contains("2026-03-01T10:00:00Z user: cannot sign in"));
        assert!(rendered.contains("2026-03-01T10:05:00Z admin: reset sent"));

        let stats = TicketStats::from_tickets([&ticket]);
        assert_eq!(render_stats(&stats), "total: 1  open: 1  pending: 0  closed: 0");
        assert_eq!(render_ticket_table(&[]), "No tickets.\n");
        assert_eq!(render_view(&TicketViewSnapshot::default()), "No ticket loaded.\n");
    }
}
