use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gp_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use gp_contracts::events::{EventPayload, EventWriter};
use gp_contracts::models::ModelRegistry;
use gp_contracts::session::{ImageBlob, ImageRef, Message, MessageId, Role, Session};
use gp_engine::{
    build_client, decode_data_uri, execute_turn, image_digest_hex, ClientModels,
    ConversationController, PendingTurn, SendOutcome, SendRejected, TurnReply,
};
use serde_json::{json, Map, Value};

#[derive(Debug, Parser)]
#[command(name = "gp", version, about = "GP: chat, vision and /imagine from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Ask(AskArgs),
    Models,
}

#[derive(Debug, Args)]
struct ProviderArgs {
    #[arg(long, default_value = "gemini")]
    provider: String,
    #[arg(long)]
    text_model: Option<String>,
    #[arg(long)]
    vision_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    save_images: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    provider: ProviderArgs,
    #[arg(long)]
    skip_login: bool,
}

#[derive(Debug, Parser)]
struct AskArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    image: Option<PathBuf>,
    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginMethod {
    Email,
    Google,
    Phone,
}

impl LoginMethod {
    fn label(self) -> &'static str {
        match self {
            LoginMethod::Email => "Email",
            LoginMethod::Google => "Google",
            LoginMethod::Phone => "Phone",
        }
    }
}

enum ChatEvent {
    Line(String),
    InputClosed,
    TurnFinished {
        turn: PendingTurn,
        result: Result<TurnReply>,
    },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("gp error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Ask(args) => run_ask(args),
        Command::Models => {
            print_models(None);
            Ok(0)
        }
    }
}

fn build_controller(args: &ProviderArgs) -> Result<(ConversationController, ClientModels)> {
    let (models, notes) = ClientModels::resolve(
        &args.provider,
        args.text_model.as_deref(),
        args.vision_model.as_deref(),
        args.image_model.as_deref(),
    )?;
    for note in notes {
        eprintln!("note: {note}");
    }
    let client = build_client(&args.provider, models.clone())?;
    let session = Session::new();
    let session_id = session.session_id().to_string();
    let mut controller = ConversationController::new(client, session);
    if let Some(path) = args.events.as_ref() {
        let events = EventWriter::open(path, session_id)?;
        events.emit(
            "session_started",
            json_object(json!({
                "provider": args.provider,
                "text_model": models.text,
                "vision_model": models.vision,
                "image_model": models.image,
            })),
        )?;
        controller = controller.with_events(events);
    }
    Ok((controller, models))
}

fn run_ask(args: AskArgs) -> Result<i32> {
    let (mut controller, _) = build_controller(&args.provider)?;
    controller.set_authenticated(true);
    let image = args
        .image
        .as_deref()
        .map(ImageBlob::from_path)
        .transpose()?;

    match controller.send(&args.prompt, image)? {
        SendOutcome::Rejected(reason) => {
            eprintln!("Nothing sent: {reason}");
            Ok(2)
        }
        SendOutcome::Completed {
            assistant_id,
            failed,
            ..
        } => {
            if let Some(message) = controller.session().get(assistant_id) {
                println!("{}", format_message(message));
                save_generated_image(message, args.provider.save_images.as_deref())?;
            }
            Ok(if failed { 1 } else { 0 })
        }
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let (mut controller, models) = build_controller(&args.provider)?;

    let (tx, rx) = mpsc::channel();
    spawn_input_reader(tx.clone());

    if !args.skip_login {
        let Some(method) = login_gate(&rx)? else {
            return Ok(());
        };
        println!("Signed in with {}.", method.label());
    }
    controller.set_authenticated(true);

    println!("GP. Think. Create. See.");
    println!("Ask anything, or use /imagine <prompt> to create images. Type /help for commands.");

    let mut repl = ChatRepl::new(controller, models, args.provider.save_images, tx);
    print_prompt();
    while let Ok(event) = rx.recv() {
        if repl.handle(event)? == Flow::Stop {
            break;
        }
        if !repl.is_busy() {
            print_prompt();
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Chat state between events: the controller, the staged attachment and
/// whether the user asked to leave.
struct ChatRepl {
    controller: ConversationController,
    models: ClientModels,
    save_dir: Option<PathBuf>,
    staged_image: Option<ImageBlob>,
    closing: bool,
    tx: Sender<ChatEvent>,
}

impl ChatRepl {
    fn new(
        controller: ConversationController,
        models: ClientModels,
        save_dir: Option<PathBuf>,
        tx: Sender<ChatEvent>,
    ) -> Self {
        Self {
            controller,
            models,
            save_dir,
            staged_image: None,
            closing: false,
            tx,
        }
    }

    fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    fn handle(&mut self, event: ChatEvent) -> Result<Flow> {
        match event {
            ChatEvent::Line(input) => self.handle_line(&input),
            ChatEvent::InputClosed => Ok(self.close()),
            ChatEvent::TurnFinished { turn, result } => {
                let assistant_id = turn.assistant_id;
                self.controller.resolve_turn(turn, result)?;
                self.print_resolved(assistant_id);
                Ok(if self.closing {
                    Flow::Stop
                } else {
                    Flow::Continue
                })
            }
        }
    }

    /// Leaves now, or once the reply in flight has been shown.
    fn close(&mut self) -> Flow {
        if !self.is_busy() {
            return Flow::Stop;
        }
        if !self.closing {
            println!("Waiting for the pending reply before exiting.");
            self.closing = true;
        }
        Flow::Continue
    }

    fn handle_line(&mut self, input: &str) -> Result<Flow> {
        let intent = parse_intent(input);
        // A blank line still sends an attached image on its own.
        let action = if intent.action == "noop" && self.staged_image.is_some() {
            "send"
        } else {
            intent.action.as_str()
        };
        match action {
            "noop" => {}
            "quit" => return Ok(self.close()),
            "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join("  ")),
            "search" => {
                let term = value_as_string(intent.command_args.get("term"));
                self.controller.set_search_term(&term);
                print_history(self.controller.session());
            }
            "history" => print_history(self.controller.session()),
            "attach" => self.attach(&value_as_string(intent.command_args.get("path"))),
            "detach" => {
                if self.staged_image.take().is_some() {
                    println!("Attachment removed.");
                } else {
                    println!("No attachment to remove.");
                }
            }
            "models" => print_models(Some(&self.models)),
            "contact" => {
                for (label, link) in contact_links() {
                    println!("{label}: {link}");
                }
            }
            "unknown" => {
                let command = value_as_string(intent.command_args.get("command"));
                println!("Unknown command /{command}. Type /help for commands.");
            }
            _ => self.send(intent.prompt.as_deref().unwrap_or_default())?,
        }
        Ok(Flow::Continue)
    }

    fn attach(&mut self, path: &str) {
        if path.is_empty() {
            println!("/attach requires a path");
            return;
        }
        match ImageBlob::from_path(Path::new(path)) {
            Ok(blob) => {
                println!(
                    "Attached {} ({}, {} bytes). It will go with your next message.",
                    path,
                    blob.media_type,
                    blob.bytes.len()
                );
                self.staged_image = Some(blob);
            }
            Err(err) => println!("Attach failed: {err:#}"),
        }
    }

    /// Starts a turn. The staged image is only consumed when one starts.
    fn send(&mut self, text: &str) -> Result<()> {
        match self.controller.begin_turn(text, self.staged_image.clone()) {
            Ok(turn) => {
                self.staged_image = None;
                self.print_started(&turn);
                self.dispatch(turn)
            }
            Err(err) => match err.downcast_ref::<SendRejected>() {
                Some(SendRejected::TurnInFlight) => {
                    println!("GP is still answering. Send again once the reply arrives.");
                    Ok(())
                }
                Some(SendRejected::EmptyInput) => Ok(()),
                None => Err(err),
            },
        }
    }

    /// Runs the provider call on a worker thread; turns that need no provider
    /// resolve immediately.
    fn dispatch(&mut self, turn: PendingTurn) -> Result<()> {
        let client = self.controller.client();
        if !turn.request.needs_provider() {
            let result = execute_turn(client.as_ref(), &turn.request);
            let assistant_id = turn.assistant_id;
            self.controller.resolve_turn(turn, result)?;
            self.print_resolved(assistant_id);
            return Ok(());
        }
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = execute_turn(client.as_ref(), &turn.request);
            let _ = tx.send(ChatEvent::TurnFinished { turn, result });
        });
        Ok(())
    }

    fn print_started(&self, turn: &PendingTurn) {
        for id in [turn.user_id, turn.assistant_id] {
            if let Some(message) = self.controller.session().get(id) {
                println!("{}", format_message(message));
            }
        }
    }

    fn print_resolved(&self, id: MessageId) {
        let Some(message) = self.controller.session().get(id) else {
            return;
        };
        println!("{}", format_message(message));
        if let Err(err) = save_generated_image(message, self.save_dir.as_deref()) {
            println!("Save failed: {err:#}");
        }
    }
}

fn spawn_input_reader(tx: Sender<ChatEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let input = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(ChatEvent::Line(input)).is_err() {
                        return;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = tx.send(ChatEvent::InputClosed);
    });
}

/// Blocks until the user picks a sign-in option. `None` when input ends.
fn login_gate(rx: &Receiver<ChatEvent>) -> Result<Option<LoginMethod>> {
    println!("Welcome to GP. Think. Create. See. All in One.");
    println!("Log in to start:  1) Continue with Email  2) Continue with Google  3) Continue with Phone");
    loop {
        print!("login> ");
        io::stdout().flush()?;
        match rx.recv() {
            Ok(ChatEvent::Line(input)) => match parse_login_choice(&input) {
                Some(method) => return Ok(Some(method)),
                None => println!("Choose 1, 2 or 3 (or email, google, phone)."),
            },
            Ok(ChatEvent::InputClosed) | Err(_) => return Ok(None),
            Ok(ChatEvent::TurnFinished { .. }) => bail!("turn finished before login"),
        }
    }
}

fn parse_login_choice(input: &str) -> Option<LoginMethod> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "email" => Some(LoginMethod::Email),
        "2" | "google" => Some(LoginMethod::Google),
        "3" | "phone" => Some(LoginMethod::Phone),
        _ => None,
    }
}

fn print_prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn print_history(session: &Session) {
    for line in format_history(session) {
        println!("{line}");
    }
}

const CONTACT_EMAIL: &str = "mailto:pantane254@gmail.com";
const CONTACT_WHATSAPP: &str =
    "https://wa.me/254740312402?text=Hi%20Pantane%2C%20I%20discovered%20GP%20and%20love%20your%20work!";

fn contact_links() -> [(&'static str, &'static str); 2] {
    [("Email the creator", CONTACT_EMAIL), ("WhatsApp", CONTACT_WHATSAPP)]
}

fn print_models(active: Option<&ClientModels>) {
    if let Some(models) = active {
        println!(
            "Active: text={} vision={} image={}",
            models.text, models.vision, models.image
        );
    }
    for model in ModelRegistry::new(None).list() {
        println!(
            "{:<32} {:<8} {}",
            model.name,
            model.provider,
            model.capabilities.join(",")
        );
    }
}

fn format_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "You",
        Role::Assistant => "GP",
    };
    let mut lines = vec![format!("[#{}] {speaker}:", message.id)];
    if message.is_pending() {
        lines.push("  GP is thinking…".to_string());
        return lines.join("\n");
    }
    if let Some(image) = message.image() {
        lines.push(format!("  {}", describe_image(image)));
    }
    if let Some(text) = message.text() {
        lines.extend(text.lines().map(|line| format!("  {line}")));
    }
    lines.join("\n")
}

fn describe_image(image: &ImageRef) -> String {
    match image {
        ImageRef::Preview {
            source,
            media_type,
            byte_len,
        } => format!("[image: {source} ({media_type}, {byte_len} bytes)]"),
        ImageRef::Generated { data_uri } => match decode_data_uri(data_uri) {
            Ok((media_type, bytes)) => {
                format!("[generated image: {media_type}, {} bytes]", bytes.len())
            }
            Err(_) => "[generated image]".to_string(),
        },
    }
}

/// The visible conversation, newest first.
fn format_history(session: &Session) -> Vec<String> {
    let visible = session.visible_messages();
    let term = session.search_term();
    if visible.is_empty() {
        if term.is_empty() {
            return vec!["No messages yet.".to_string()];
        }
        return vec![format!("No messages found for \"{term}\"")];
    }
    let mut lines = Vec::new();
    if !term.is_empty() {
        lines.push(format!("Messages matching \"{term}\" (newest first):"));
    }
    lines.extend(visible.into_iter().map(format_message));
    lines
}

fn save_generated_image(message: &Message, save_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let Some(dir) = save_dir else {
        return Ok(None);
    };
    let Some(ImageRef::Generated { data_uri }) = message.image() else {
        return Ok(None);
    };
    let (_, bytes) = decode_data_uri(data_uri)?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(format!("gp-{}.jpg", image_digest_hex(&bytes)));
    fs::write(&path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Saved image to {}", path.display());
    Ok(Some(path))
}

fn value_as_string(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn json_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_else(Map::new)
}
