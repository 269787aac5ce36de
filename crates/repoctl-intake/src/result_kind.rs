//! Result-kind classification (§4.3 "Result kinds"): the reported
//! status splits into three handling paths that share nothing except
//! the session lookup.

use repoctl_types::ResultStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Interrupt,
    Skip,
    Other,
}

pub fn classify(status: ResultStatus) -> ResultKind {
    match status {
        ResultStatus::Interrupt => ResultKind::Interrupt,
        ResultStatus::Skip => ResultKind::Skip,
        _ => ResultKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_and_skip_are_their_own_kind() {
        assert_eq!(classify(ResultStatus::Interrupt), ResultKind::Interrupt);
        assert_eq!(classify(ResultStatus::Skip), ResultKind::Skip);
    }

    #[test]
    fn every_terminal_status_is_other() {
        for s in [
            ResultStatus::Success,
            ResultStatus::Warning,
            ResultStatus::Error,
            ResultStatus::Abort,
            ResultStatus::Abnormal,
        ] {
            assert_eq!(classify(s), ResultKind::Other);
        }
    }
}
