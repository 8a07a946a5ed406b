use amplify_todo::authenticator::{Authenticator, Route};
use amplify_todo::config::{AmplifyOutputs, ClientOptions};
use amplify_todo::error::Error;
use amplify_todo::shell::{AppShell, Presentation, Prompt, Theme, ViewMode};
use amplify_todo::signup::SignUpFields;
use amplify_todo::Amplify;
use dotenv::dotenv;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Reads answers from the terminal; EOF counts as cancel
struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, message: &str) -> Option<String> {
        print!("{}: ", message);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

fn ask(message: &str) -> String {
    StdinPrompt.ask(message).unwrap_or_default()
}

/// Sign in, or sign up and confirm first. Returns false when the user quits.
async fn authenticate(authenticator: &Authenticator) -> Result<bool, Error> {
    loop {
        match authenticator.route() {
            Route::SignedIn => return Ok(true),
            Route::SignIn => match ask("sign in / sign up / quit [in/up/q]").as_str() {
                "up" => authenticator.show(Route::SignUp),
                "q" | "quit" => return Ok(false),
                _ => {
                    let email = ask("Email");
                    let password = ask("Password");
                    if let Err(e) = authenticator.sign_in(&email, &password).await {
                        println!("로그인 실패: {}", e);
                    }
                }
            },
            Route::SignUp => {
                let fields = SignUpFields {
                    email: ask("Email"),
                    name: ask("Name"),
                    password: ask("Password"),
                    confirm_password: ask("Confirm Password"),
                };
                let agreed = ask("이용약관에 동의합니다. [y/N]");
                authenticator
                    .form()
                    .set_terms_accepted(agreed.eq_ignore_ascii_case("y"));

                match authenticator.sign_up(&fields).await {
                    Ok(result) if result.user_confirmed => println!("가입 완료. 로그인해주세요."),
                    Ok(_) => {}
                    Err(Error::Validation(v)) => println!("{}", v.message()),
                    Err(e) => {
                        println!("회원가입 실패: {}", e);
                        authenticator.show(Route::SignIn);
                    }
                }
            }
            Route::ConfirmSignUp { email } => {
                let code = ask(&format!("Confirmation code sent to {} (r = resend)", email));
                let result = if code == "r" {
                    authenticator.resend_code(&email).await
                } else {
                    authenticator.confirm_sign_up(&email, &code).await
                };
                if let Err(e) = result {
                    println!("확인 실패: {}", e);
                }
            }
        }
    }
}

fn print_items(shell: &AppShell) {
    let state = shell.state();
    if state.is_loading {
        println!("할 일 목록을 불러오는 중입니다...");
        return;
    }
    println!("{}님, 환영합니다 👋 ({})", state.display_name, state.view_mode.as_str());
    if state.todos.is_empty() {
        println!("현재 등록된 할 일이 없습니다.");
    }
    for (i, todo) in state.todos.iter().enumerate() {
        println!("  {}. {}", i + 1, todo.text());
    }
}

/// Returns false when the user quits
async fn run_shell(shell: &mut AppShell) -> Result<bool, Error> {
    shell.mount().await?;
    print_items(shell);

    loop {
        let line = ask("new | del <n> | list | tile | html | signout | quit");
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("new"), _) => {
                if shell.create_todo(&mut StdinPrompt).is_some() {
                    println!("요청을 보냈습니다.");
                }
            }
            (Some("del"), Some(n)) => {
                let todos = shell.state().todos;
                match n.parse::<usize>().ok().and_then(|n| todos.get(n.wrapping_sub(1))) {
                    Some(todo) => {
                        let _ = shell.delete_todo(&todo.id);
                    }
                    None => println!("No item {}", n),
                }
            }
            (Some("list"), _) => {
                shell.set_view_mode(ViewMode::List);
                print_items(shell);
            }
            (Some("tile"), _) => {
                shell.set_view_mode(ViewMode::Tile);
                print_items(shell);
            }
            (Some("html"), _) => println!("{}", shell.render()),
            (Some("signout"), _) => {
                if let Err(e) = shell.sign_out().await {
                    log::warn!("Sign-out failed: {}", e);
                }
                shell.unmount().await;
                return Ok(true);
            }
            (Some("quit"), _) | (Some("q"), _) => {
                shell.unmount().await;
                return Ok(false);
            }
            (None, _) => print_items(shell),
            _ => println!("Unknown command"),
        }
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();
    pretty_env_logger::init();

    let outputs = AmplifyOutputs::from_env()?;
    let amplify = Amplify::configure(outputs, ClientOptions::default())?;
    let authenticator = Arc::new(amplify.authenticator());

    let mut shell = AppShell::new(
        Arc::new(amplify.data().clone()),
        authenticator.clone(),
        Presentation::for_theme(Theme::Badge),
    );

    loop {
        if !authenticate(&authenticator).await? {
            break;
        }
        if !run_shell(&mut shell).await? {
            break;
        }
    }

    println!("Bye");
    Ok(())
}
