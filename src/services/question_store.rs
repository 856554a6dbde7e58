//! 题目状态存储 - 业务能力层
//!
//! 按 1-based 题号保存每道题的选项与作答状态。只做本地状态变更，
//! 远程保存由调用方根据返回的 [`SubmitTicket`] 完成，成功后调用
//! [`QuestionStore::confirm_submission`]。每题记录后端最近确认的选项，
//! 与当前选择不一致的题目都算待补交。

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::models::{AnswerState, AnswerStatus, OptionKey, QuestionId};

/// 题目统计（每次读取时重新计算）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub total: usize,
    pub attempted: usize,
    pub remaining: usize,
}

/// 一次提交需要远程保存的数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    pub position: usize,
    pub question_id: QuestionId,
    pub option: OptionKey,
    /// 提交前的状态，远程保存失败时用于回滚
    pub previous: AnswerStatus,
}

/// 待补交的答案（当前选择尚未被后端保存）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    pub position: usize,
    pub question_id: QuestionId,
    pub option: OptionKey,
}

/// 题目状态存储
#[derive(Debug, Default)]
pub struct QuestionStore {
    ids: Vec<QuestionId>,
    states: Vec<AnswerState>,
    frozen: bool,
}

impl QuestionStore {
    /// 初始化题目列表并恢复之前保存的答案
    ///
    /// `prior_answers` 是后端给出的 JSON 对象，key 为 0-based 题目下标，
    /// value 为选项字母。格式不正确时只记录警告，保持默认状态。
    pub fn initialize(ids: Vec<QuestionId>, prior_answers: Option<&serde_json::Value>) -> Self {
        let mut store = Self {
            states: vec![AnswerState::default(); ids.len()],
            ids,
            frozen: false,
        };

        if let Some(raw) = prior_answers {
            match parse_prior_answers(raw) {
                Some(answers) => store.restore(answers),
                None => warn!("已保存答案格式无法识别，按未作答处理: {}", raw),
            }
        }

        store
    }

    fn restore(&mut self, answers: HashMap<String, String>) {
        let mut restored = 0;
        for (key, value) in answers {
            let index = key.trim().parse::<usize>().ok();
            let position = match index.and_then(|index| index.checked_add(1)) {
                Some(position) => position,
                None => {
                    debug!("跳过无法识别的题目下标: {}", key);
                    continue;
                }
            };
            let option = match value.parse::<OptionKey>() {
                Ok(option) => option,
                Err(_) => {
                    debug!("跳过无法识别的已保存选项: {} => {}", key, value);
                    continue;
                }
            };
            if let Some(state) = self.states.get_mut(position - 1) {
                state.selected = Some(option);
                state.synced = Some(option);
                state.status = AnswerStatus::Submitted;
                restored += 1;
            }
        }
        debug!("已恢复 {} 道题的答案", restored);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// 题目是否已冻结（考试结束后不再接受修改）
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn question_id(&self, position: usize) -> Result<&QuestionId, ValidationError> {
        self.check_position(position)?;
        Ok(&self.ids[position - 1])
    }

    pub fn state(&self, position: usize) -> Result<&AnswerState, ValidationError> {
        self.check_position(position)?;
        Ok(&self.states[position - 1])
    }

    /// 所有题目的状态（按题号顺序）
    pub fn states(&self) -> &[AnswerState] {
        &self.states
    }

    /// 选择答案
    pub fn select(&mut self, position: usize, option: OptionKey) -> Result<(), ValidationError> {
        let state = self.state_mut(position)?;
        state.selected = Some(option);
        if !state.status.is_submitted() {
            state.status = AnswerStatus::Marked;
        }
        Ok(())
    }

    /// 提交答案
    ///
    /// 没有选择时返回 `NoSelection`，状态不变；成功后状态为 `Submitted`（清除书签）。
    pub fn submit(&mut self, position: usize) -> Result<SubmitTicket, ValidationError> {
        let question_id = self.question_id(position)?.clone();
        let state = self.state_mut(position)?;
        let option = state
            .selected
            .ok_or(ValidationError::NoSelection { position })?;
        let previous = state.status;
        state.status = AnswerStatus::Submitted;
        Ok(SubmitTicket {
            position,
            question_id,
            option,
            previous,
        })
    }

    /// 远程保存成功后记录已同步的选项
    ///
    /// 保存期间选择又被修改时不记录，新选择仍待补交。
    pub fn confirm_submission(&mut self, ticket: &SubmitTicket) {
        if let Some(state) = self.states.get_mut(ticket.position.wrapping_sub(1)) {
            if state.selected == Some(ticket.option) {
                state.synced = Some(ticket.option);
            }
        }
    }

    /// 远程保存失败时撤销一次提交
    ///
    /// 只有状态仍是这次提交写入的 `Submitted` 时才回滚，期间被切换过书签则不动。
    /// 回滚后选择与已同步选项不一致，收尾时会补交。
    pub fn revert_submission(&mut self, ticket: &SubmitTicket) {
        if let Ok(state) = self.state_mut(ticket.position) {
            if state.status == AnswerStatus::Submitted && state.selected == Some(ticket.option) {
                state.status = ticket.previous;
            }
        }
    }

    /// 切换书签
    pub fn toggle_bookmark(&mut self, position: usize) -> Result<AnswerStatus, ValidationError> {
        let state = self.state_mut(position)?;
        state.status = state.status.toggled_bookmark();
        Ok(state.status)
    }

    /// 当前选择尚未被后端保存的答案（包括重新提交失败的已提交题目）
    pub fn pending_answers(&self) -> Vec<PendingAnswer> {
        self.ids
            .iter()
            .zip(&self.states)
            .enumerate()
            .filter_map(|(index, (id, state))| match state.selected {
                Some(option) if state.is_unsynced() => Some(PendingAnswer {
                    position: index + 1,
                    question_id: id.clone(),
                    option,
                }),
                _ => None,
            })
            .collect()
    }

    /// 补交成功后标记为已提交，保留书签位
    pub fn mark_flushed(&mut self, answer: &PendingAnswer) {
        if let Some(state) = self.states.get_mut(answer.position.wrapping_sub(1)) {
            state.synced = Some(answer.option);
            state.status = if state.status.is_bookmarked() {
                AnswerStatus::SubmittedBookmarked
            } else {
                AnswerStatus::Submitted
            };
        }
    }

    pub fn counters(&self) -> Counters {
        let total = self.states.len();
        let attempted = self
            .states
            .iter()
            .filter(|s| s.status.is_submitted())
            .count();
        Counters {
            total,
            attempted,
            remaining: total - attempted,
        }
    }

    fn check_position(&self, position: usize) -> Result<(), ValidationError> {
        if position == 0 || position > self.ids.len() {
            return Err(ValidationError::PositionOutOfRange {
                position,
                total: self.ids.len(),
            });
        }
        Ok(())
    }

    fn state_mut(&mut self, position: usize) -> Result<&mut AnswerState, ValidationError> {
        if self.frozen {
            return Err(ValidationError::SessionFinalized);
        }
        self.check_position(position)?;
        Ok(&mut self.states[position - 1])
    }
}

/// 解析已保存答案
///
/// 接受 JSON 对象，或内容为 JSON 对象的字符串（模板渲染时常见）。
fn parse_prior_answers(raw: &serde_json::Value) -> Option<HashMap<String, String>> {
    let object = match raw {
        serde_json::Value::Null => return Some(HashMap::new()),
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::String(text) if text.trim().is_empty() => return Some(HashMap::new()),
        serde_json::Value::String(text) => match serde_json::from_str(text) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return None,
        },
        _ => return None,
    };

    Some(
        object
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(n: usize) -> Vec<QuestionId> {
        (1..=n).map(|i| QuestionId::new(format!("q{}", i))).collect()
    }

    fn store_with_status(status: AnswerStatus) -> QuestionStore {
        let mut store = QuestionStore::initialize(ids(1), None);
        store.states[0] = AnswerState {
            selected: if matches!(status, AnswerStatus::NotMarked | AnswerStatus::Bookmarked) {
                None
            } else {
                Some(OptionKey::A)
            },
            status,
            synced: status.is_submitted().then_some(OptionKey::A),
        };
        store
    }

    #[test]
    fn test_initialize_defaults() {
        let store = QuestionStore::initialize(ids(3), None);
        assert_eq!(store.len(), 3);
        assert!(store.states().iter().all(|s| *s == AnswerState::default()));
    }

    #[test]
    fn test_initialize_restores_prior_answers() {
        let store = QuestionStore::initialize(ids(3), Some(&json!({ "0": "a", "2": "d" })));
        assert_eq!(store.state(1).unwrap().status, AnswerStatus::Submitted);
        assert_eq!(store.state(1).unwrap().selected, Some(OptionKey::A));
        assert_eq!(store.state(2).unwrap().status, AnswerStatus::NotMarked);
        assert_eq!(store.state(3).unwrap().selected, Some(OptionKey::D));
    }

    #[test]
    fn test_initialize_accepts_json_text() {
        let store = QuestionStore::initialize(ids(2), Some(&json!(r#"{"1": "c"}"#)));
        assert_eq!(store.state(2).unwrap().selected, Some(OptionKey::C));
    }

    #[test]
    fn test_initialize_malformed_keeps_defaults() {
        let store = QuestionStore::initialize(ids(2), Some(&json!("{not json")));
        assert_eq!(store.counters().attempted, 0);

        let store = QuestionStore::initialize(ids(2), Some(&json!([1, 2, 3])));
        assert_eq!(store.counters().attempted, 0);

        // 越界下标与非法选项被忽略
        let store = QuestionStore::initialize(ids(2), Some(&json!({ "7": "a", "0": "z" })));
        assert_eq!(store.counters().attempted, 0);

        let store = QuestionStore::initialize(
            ids(2),
            Some(&json!({ "18446744073709551615": "a", "99999999999999999999999": "b" })),
        );
        assert_eq!(store.counters().attempted, 0);
    }

    #[test]
    fn test_restored_answers_are_synced() {
        let store = QuestionStore::initialize(ids(2), Some(&json!({ "0": "b" })));
        assert_eq!(store.state(1).unwrap().synced, Some(OptionKey::B));
        assert!(store.pending_answers().is_empty());
    }

    #[test]
    fn test_failed_resubmission_stays_pending() {
        let mut store = QuestionStore::initialize(ids(2), None);
        store.select(1, OptionKey::A).unwrap();
        let first = store.submit(1).unwrap();
        store.confirm_submission(&first);
        assert!(store.pending_answers().is_empty());

        store.select(1, OptionKey::C).unwrap();
        let second = store.submit(1).unwrap();
        store.revert_submission(&second);

        let state = store.state(1).unwrap();
        assert_eq!(state.status, AnswerStatus::Submitted);
        assert_eq!(state.synced, Some(OptionKey::A));
        assert_eq!(
            store.pending_answers(),
            vec![PendingAnswer {
                position: 1,
                question_id: QuestionId::new("q1"),
                option: OptionKey::C,
            }]
        );
    }

    #[test]
    fn test_confirm_ignores_superseded_selection() {
        let mut store = QuestionStore::initialize(ids(1), None);
        store.select(1, OptionKey::A).unwrap();
        let ticket = store.submit(1).unwrap();
        store.select(1, OptionKey::B).unwrap();
        store.confirm_submission(&ticket);

        assert_eq!(store.state(1).unwrap().synced, None);
        assert_eq!(store.pending_answers().len(), 1);
    }

    #[test]
    fn test_select_marks_but_never_unsubmits() {
        let mut store = QuestionStore::initialize(ids(2), None);
        store.select(1, OptionKey::B).unwrap();
        assert_eq!(store.state(1).unwrap().status, AnswerStatus::Marked);

        store.submit(1).unwrap();
        store.select(1, OptionKey::C).unwrap();
        let state = store.state(1).unwrap();
        assert_eq!(state.status, AnswerStatus::Submitted);
        assert_eq!(state.selected, Some(OptionKey::C));
    }

    #[test]
    fn test_submit_without_selection_fails_and_keeps_status() {
        for status in [AnswerStatus::NotMarked, AnswerStatus::Bookmarked] {
            let mut store = store_with_status(status);
            assert_eq!(
                store.submit(1),
                Err(ValidationError::NoSelection { position: 1 })
            );
            assert_eq!(store.state(1).unwrap().status, status);
        }
    }

    #[test]
    fn test_submit_clears_bookmark() {
        let mut store = QuestionStore::initialize(ids(1), None);
        store.select(1, OptionKey::A).unwrap();
        store.toggle_bookmark(1).unwrap();
        assert_eq!(store.state(1).unwrap().status, AnswerStatus::MarkedBookmarked);

        let ticket = store.submit(1).unwrap();
        assert_eq!(ticket.previous, AnswerStatus::MarkedBookmarked);
        assert_eq!(ticket.question_id, QuestionId::new("q1"));
        assert_eq!(store.state(1).unwrap().status, AnswerStatus::Submitted);
    }

    #[test]
    fn test_revert_submission_restores_previous() {
        let mut store = QuestionStore::initialize(ids(1), None);
        store.select(1, OptionKey::D).unwrap();
        let ticket = store.submit(1).unwrap();
        store.revert_submission(&ticket);
        assert_eq!(store.state(1).unwrap().status, AnswerStatus::Marked);
        assert_eq!(store.pending_answers().len(), 1);
    }

    #[test]
    fn test_bookmark_table() {
        let table = [
            (AnswerStatus::Marked, AnswerStatus::MarkedBookmarked),
            (AnswerStatus::MarkedBookmarked, AnswerStatus::Marked),
            (AnswerStatus::Submitted, AnswerStatus::SubmittedBookmarked),
            (AnswerStatus::SubmittedBookmarked, AnswerStatus::Submitted),
            (AnswerStatus::Bookmarked, AnswerStatus::NotMarked),
            (AnswerStatus::NotMarked, AnswerStatus::Bookmarked),
        ];
        for (from, to) in table {
            let mut store = store_with_status(from);
            assert_eq!(store.toggle_bookmark(1).unwrap(), to, "from {:?}", from);
        }
    }

    #[test]
    fn test_bookmark_twice_is_identity() {
        for status in [
            AnswerStatus::NotMarked,
            AnswerStatus::Marked,
            AnswerStatus::Bookmarked,
            AnswerStatus::MarkedBookmarked,
            AnswerStatus::Submitted,
            AnswerStatus::SubmittedBookmarked,
        ] {
            let mut store = store_with_status(status);
            store.toggle_bookmark(1).unwrap();
            store.toggle_bookmark(1).unwrap();
            assert_eq!(store.state(1).unwrap().status, status);
        }
    }

    #[test]
    fn test_counters_follow_submitted_statuses() {
        let mut store = QuestionStore::initialize(ids(4), Some(&json!({ "3": "b" })));
        store.select(1, OptionKey::A).unwrap();
        store.submit(1).unwrap();
        store.toggle_bookmark(1).unwrap();
        store.select(2, OptionKey::C).unwrap();

        let counters = store.counters();
        assert_eq!(counters.total, 4);
        assert_eq!(counters.attempted, 2);
        assert_eq!(counters.attempted + counters.remaining, counters.total);
    }

    #[test]
    fn test_pending_answers_and_flush() {
        let mut store = QuestionStore::initialize(ids(3), None);
        store.select(2, OptionKey::B).unwrap();
        store.toggle_bookmark(2).unwrap();
        store.toggle_bookmark(3).unwrap();

        let pending = store.pending_answers();
        assert_eq!(
            pending,
            vec![PendingAnswer {
                position: 2,
                question_id: QuestionId::new("q2"),
                option: OptionKey::B,
            }]
        );

        store.mark_flushed(&pending[0]);
        assert_eq!(store.state(2).unwrap().status, AnswerStatus::SubmittedBookmarked);
        assert!(store.pending_answers().is_empty());
    }

    #[test]
    fn test_frozen_store_rejects_mutations() {
        let mut store = QuestionStore::initialize(ids(1), None);
        store.freeze();
        assert_eq!(
            store.select(1, OptionKey::A),
            Err(ValidationError::SessionFinalized)
        );
        assert_eq!(store.toggle_bookmark(1), Err(ValidationError::SessionFinalized));
        assert!(store.state(1).is_ok());
    }

    #[test]
    fn test_out_of_range_positions() {
        let mut store = QuestionStore::initialize(ids(2), None);
        assert_eq!(
            store.select(0, OptionKey::A),
            Err(ValidationError::PositionOutOfRange { position: 0, total: 2 })
        );
        assert!(store.state(3).is_err());
    }
}
