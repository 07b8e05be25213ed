#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use imprint_client_core::{
	ChatApiClient, SessionEvent, SessionHandle, SessionParams, available_gifs, load_chat_config,
	load_chat_config_from_path, spawn_session,
};
use imprint_domain::{ConversationId, MessageId, UserId, UserIdentity};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::{info, warn};

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: imprint_chat --conversation <id> --user <id> [--name <display name>] [--config <path>]\n\
\n\
Options:\n\
	--conversation  Conversation to open (required)\n\
	--user          Signed-in user id (required)\n\
	--name          Signed-in user display name (default: user id)\n\
	--config        Config file (default: ~/.imprint/config.toml)\n\
	--help          Show this help\n\
\n\
Input:\n\
	<text>          Send a message\n\
	/gif <url>      Send a bundled GIF (/gif alone lists them)\n\
	/delete <id>    Delete a message for everyone\n\
	/more           Load older messages\n\
	/quit           Leave the conversation\n"
	);
	std::process::exit(2)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,imprint_client_core=debug".to_string());
	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

struct Args {
	conversation_id: ConversationId,
	user: UserIdentity,
	config_path: Option<PathBuf>,
}

fn parse_args() -> Args {
	let mut conversation: Option<String> = None;
	let mut user: Option<String> = None;
	let mut name: Option<String> = None;
	let mut config_path: Option<PathBuf> = None;

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--conversation" => conversation = Some(it.next().unwrap_or_else(|| usage_and_exit())),
			"--user" => user = Some(it.next().unwrap_or_else(|| usage_and_exit())),
			"--name" => name = Some(it.next().unwrap_or_else(|| usage_and_exit())),
			"--config" => config_path = Some(PathBuf::from(it.next().unwrap_or_else(|| usage_and_exit()))),
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	let conversation_id = conversation
		.and_then(|c| ConversationId::new(c).ok())
		.unwrap_or_else(|| {
			eprintln!("--conversation must be non-empty");
			usage_and_exit()
		});
	let user_id = user.and_then(|u| UserId::new(u).ok()).unwrap_or_else(|| {
		eprintln!("--user must be non-empty");
		usage_and_exit()
	});
	let display_name = name.unwrap_or_else(|| user_id.to_string());

	Args {
		conversation_id,
		user: UserIdentity {
			id: user_id,
			display_name,
			avatar_url: String::new(),
		},
		config_path,
	}
}

async fn handle_line(session: &SessionHandle, line: &str) -> anyhow::Result<bool> {
	let line = line.trim();
	match line.split_once(' ').unwrap_or((line, "")) {
		("/quit", _) => return Ok(false),
		("/more", _) => session.load_older_messages().await?,
		("/gif", "") => {
			for gif in available_gifs() {
				println!("  {} {}", gif.name, gif.attachment_url);
			}
		}
		("/gif", url) => session.send_gif(url.trim()).await?,
		("/delete", id) => match MessageId::new(id.trim()) {
			Ok(id) => session.delete_message(id, true).await?,
			Err(err) => eprintln!("invalid message id: {err}"),
		},
		_ if line.is_empty() => {}
		_ => session.send_message(line).await?,
	}
	Ok(true)
}

fn print_event(event: &SessionEvent) {
	match event {
		SessionEvent::MessagesChanged(messages) => {
			println!("--- {} messages ---", messages.len());
			for m in messages.iter().rev() {
				let body = m.image.as_deref().unwrap_or(&m.text);
				println!("[{}] {} <{}>: {}", m.created_at.format("%H:%M"), m.id, m.sender.name, body);
			}
		}
		SessionEvent::Notice(notice) => println!("! {notice}"),
		SessionEvent::ChannelState(state) => println!("* socket: {state:?}"),
		SessionEvent::PaginationState(state) => println!("* history: {state:?}"),
		SessionEvent::Reported(id) => println!("* reported {id}"),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();
	let args = parse_args();

	let cfg = match &args.config_path {
		Some(path) => load_chat_config_from_path(path)?,
		None => load_chat_config()?,
	};
	info!(api = %cfg.api_base_url, conversation_id = %args.conversation_id, "starting chat");

	let backend = Arc::new(ChatApiClient::new(&cfg)?);
	let params = SessionParams::new(args.conversation_id, args.user, Vec::new());
	let (session, mut events) = spawn_session(backend, &cfg, params);

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	loop {
		tokio::select! {
			ev = events.recv() => {
				let Some(ev) = ev else {
					warn!("session ended");
					break;
				};
				print_event(&ev);
			}
			line = lines.next_line() => {
				let Some(line) = line? else { break };
				if !handle_line(&session, &line).await? {
					break;
				}
			}
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	let _ = session.unmount().await;
	Ok(())
}
