use std::env;

use rand::Rng;
use terramine_session::{
    GameEvent, GameParams, GameSnapshot, create_registry, create_session, get_session,
};
use tokio::time::{Duration, sleep};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let width: usize = env::var("BOARD_WIDTH")
        .unwrap_or_else(|_| "9".to_string())
        .parse()
        .unwrap_or(9);
    let height: usize = env::var("BOARD_HEIGHT")
        .unwrap_or_else(|_| "9".to_string())
        .parse()
        .unwrap_or(9);
    let mines: usize = env::var("BOARD_MINES")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .unwrap_or(10);
    let growth_delay: f64 = env::var("GROWTH_DELAY_SECONDS")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .unwrap_or(3.0);

    let sessions = create_registry();
    let id = create_session(
        &sessions,
        GameParams {
            width,
            height,
            mines,
        },
    );
    let session = get_session(&sessions, &id).expect("session was just created");
    println!("Session started! ID: {}", id);

    // Subscribe to game events and print them in the background
    let (subscriber_id, mut events) = session.subscribe().await;
    let event_printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                GameEvent::GameInitialized {
                    width,
                    height,
                    mines,
                } => {
                    println!("🎮 New {}x{} board with {} mines", width, height, mines);
                }
                GameEvent::BoardUpdated { changed } => {
                    println!("📋 {} cells updated", changed.len());
                }
                GameEvent::GameStatusChanged { won, lost } => {
                    if won {
                        println!("🎉 You won!");
                    } else if lost {
                        println!("💣 Game over!");
                    }
                }
                GameEvent::MineGrown { mines, countdown } => {
                    println!("🌱 A mine grew! Now {} mines, next in {}s", mines, countdown);
                }
                GameEvent::CountdownTick { seconds } => {
                    println!("⏳ Next mine in {}s", seconds);
                }
            }
        }
    });

    session.set_growth_delay_override(Some(growth_delay)).await;
    session.set_terrain_mode(true).await;

    // Auto-play: reveal random untouched cells until the game ends
    loop {
        let snapshot = session.snapshot().await;
        if snapshot.board.game_over {
            println!("\nFinal board:");
            display_board(&snapshot);
            println!(
                "Mines: {} (started with {}), flags: {}",
                snapshot.board.mines, snapshot.board.initial_mines, snapshot.board.flags_placed
            );
            break;
        }

        let hidden: Vec<usize> = snapshot
            .board
            .cells
            .iter()
            .filter(|cell| !cell.revealed && !cell.flagged)
            .map(|cell| cell.index)
            .collect();
        let target = hidden[rand::rng().random_range(0..hidden.len())];

        println!("Revealing cell {}...", target);
        session.reveal(target).await;

        sleep(Duration::from_millis(500)).await;
    }

    session.unsubscribe(&subscriber_id).await;
    event_printer.abort();
    let _ = event_printer.await;
}

fn display_board(snapshot: &GameSnapshot) {
    for y in 0..snapshot.board.height {
        print!("  ");
        for x in 0..snapshot.board.width {
            let cell = &snapshot.board.cells[x + y * snapshot.board.width];
            let symbol = if cell.revealed && cell.mine {
                "💣".to_string()
            } else if cell.flagged {
                "F".to_string()
            } else if cell.question {
                "?".to_string()
            } else if cell.revealed {
                match cell.adjacent {
                    0 => " ".to_string(),
                    n => n.to_string(),
                }
            } else {
                "·".to_string()
            };
            print!("{:2}", symbol);
        }
        println!("  {}", y);
    }

    print!("  ");
    for x in 0..snapshot.board.width {
        print!("{:2}", x);
    }
    println!();
}
