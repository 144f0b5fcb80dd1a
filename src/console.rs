// Terminal front end for `soundboard play`
// One numbered line per button; typing a number presses it
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::board::Soundboard;
use crate::playback::ClipSnapshot;

enum Input {
    Press(usize),
    Show,
    Quit,
    Unknown,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" | "l" | "list" => Input::Show,
        "q" | "quit" | "exit" => Input::Quit,
        other => match other.parse::<usize>() {
            Ok(n) if n > 0 => Input::Press(n - 1),
            _ => Input::Unknown,
        },
    }
}

fn render(status: &str, buttons: &[ClipSnapshot]) -> String {
    let mut out = format!("[{}]\n", status);
    for (i, button) in buttons.iter().enumerate() {
        let marker = if button.status.is_live() { '>' } else { ' ' };
        out.push_str(&format!("{} {:>2}. {} ({})\n", marker, i + 1, button.name, button.status));
    }
    out.push_str("Number to toggle, Enter to refresh, q to quit");
    out
}

pub async fn run_console(board: Soundboard) -> anyhow::Result<()> {
    println!("{}", render(&board.status().to_string(), &board.buttons()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Show => {}
            Input::Unknown => println!("Unknown input: {}", line.trim()),
            Input::Press(index) => {
                let Some(button) = board.buttons().into_iter().nth(index) else {
                    println!("No button {}", index + 1);
                    continue;
                };
                match board.press(&button.id).await {
                    Ok(outcome) => tracing::debug!("{} -> {:?}", button.id, outcome),
                    Err(e) => println!("Error: {}", e),
                }
            }
        }
        println!("{}", render(&board.status().to_string(), &board.buttons()));
    }

    board.shutdown().await;
    Ok(())
}
