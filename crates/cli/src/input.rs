use viewer_core::NavigationIntent;

const ARROW_RIGHT: &str = "\x1b[C";
const ARROW_LEFT: &str = "\x1b[D";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Navigate(NavigationIntent),
    Quit,
    Empty,
    Unknown,
}

/// Maps one line of terminal input to a viewer command.
pub fn parse_line(line: &str) -> Input {
    let trimmed = line.trim();
    match trimmed {
        "" => Input::Empty,
        ARROW_RIGHT => Input::Navigate(NavigationIntent::Next),
        ARROW_LEFT => Input::Navigate(NavigationIntent::Prev),
        _ => match trimmed.to_ascii_lowercase().as_str() {
            "n" | "next" | "l" => Input::Navigate(NavigationIntent::Next),
            "p" | "prev" | "h" => Input::Navigate(NavigationIntent::Prev),
            "q" | "quit" => Input::Quit,
            _ => Input::Unknown,
        },
    }
}

pub fn is_affirmative(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
