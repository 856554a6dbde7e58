//! 终端命令解析
//!
//! 每行一条命令，大小写不敏感：
//!
//! | 命令 | 说明 |
//! |---|---|
//! | `n` / `next` | 下一题 |
//! | `p` / `prev` | 上一题 |
//! | `g 5` / `goto 5` | 跳到第 5 题 |
//! | `a` `b` `c` `d` / `select b` | 选择答案 |
//! | `m` / `bookmark` | 切换书签 |
//! | `s` / `submit` | 提交当前题 |
//! | `show` | 重新显示当前题 |
//! | `status` | 显示题号面板与统计 |
//! | `finish` / `confirm` | 交卷（先显示统计，再确认） |
//! | `copy` `cut` `paste` `contextmenu` `printscreen` `blur` | 上报违规操作 |
//! | `quit` | 中断会话（保存进度，不交卷） |

use std::str::FromStr;

use thiserror::Error;

use crate::models::{OptionKey, ProhibitedAction};

/// 终端命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    Goto(usize),
    Select(OptionKey),
    Bookmark,
    Submit,
    Show,
    Status,
    Finish,
    Confirm,
    Report(ProhibitedAction),
    Help,
    Quit,
}

/// 命令解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("空命令")]
    Empty,
    #[error("未知命令: {0}（输入 help 查看帮助）")]
    Unknown(String),
    #[error("命令 {0} 缺少参数")]
    MissingArgument(&'static str),
    #[error("无效参数: {0}")]
    InvalidArgument(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let head = parts.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let arg = parts.next();

        let command = match head.as_str() {
            "n" | "next" => Command::Next,
            "p" | "prev" | "previous" => Command::Previous,
            "g" | "goto" => {
                let raw = arg.ok_or(CommandError::MissingArgument("goto"))?;
                let position = raw
                    .parse::<usize>()
                    .map_err(|_| CommandError::InvalidArgument(raw.to_string()))?;
                Command::Goto(position)
            }
            "select" => {
                let raw = arg.ok_or(CommandError::MissingArgument("select"))?;
                let option = raw
                    .parse::<OptionKey>()
                    .map_err(|_| CommandError::InvalidArgument(raw.to_string()))?;
                Command::Select(option)
            }
            "a" | "b" | "c" | "d" => {
                let option = head
                    .parse::<OptionKey>()
                    .map_err(|_| CommandError::InvalidArgument(head.clone()))?;
                Command::Select(option)
            }
            "m" | "bookmark" => Command::Bookmark,
            "s" | "submit" => Command::Submit,
            "show" => Command::Show,
            "status" => Command::Status,
            "finish" => Command::Finish,
            "confirm" => Command::Confirm,
            "copy" => Command::Report(ProhibitedAction::Copy),
            "cut" => Command::Report(ProhibitedAction::Cut),
            "paste" => Command::Report(ProhibitedAction::Paste),
            "contextmenu" => Command::Report(ProhibitedAction::ContextMenu),
            "printscreen" => Command::Report(ProhibitedAction::PrintScreen),
            "blur" => Command::Report(ProhibitedAction::FocusLost),
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            _ => return Err(CommandError::Unknown(head)),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigation() {
        assert_eq!("n".parse::<Command>(), Ok(Command::Next));
        assert_eq!("PREV".parse::<Command>(), Ok(Command::Previous));
        assert_eq!("goto 7".parse::<Command>(), Ok(Command::Goto(7)));
    }

    #[test]
    fn test_parse_select_forms() {
        assert_eq!("b".parse::<Command>(), Ok(Command::Select(OptionKey::B)));
        assert_eq!("select D".parse::<Command>(), Ok(Command::Select(OptionKey::D)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Command>(), Err(CommandError::Empty));
        assert_eq!(
            "goto".parse::<Command>(),
            Err(CommandError::MissingArgument("goto"))
        );
        assert_eq!(
            "goto x".parse::<Command>(),
            Err(CommandError::InvalidArgument("x".to_string()))
        );
        assert_eq!(
            "select e".parse::<Command>(),
            Err(CommandError::InvalidArgument("e".to_string()))
        );
        assert!(matches!(
            "jump".parse::<Command>(),
            Err(CommandError::Unknown(_))
        ));
    }

    #[test]
    fn test_parse_prohibited_actions() {
        assert_eq!(
            "paste".parse::<Command>(),
            Ok(Command::Report(ProhibitedAction::Paste))
        );
        assert_eq!(
            "blur".parse::<Command>(),
            Ok(Command::Report(ProhibitedAction::FocusLost))
        );
    }
}
