//! `submit(uint256,int256)` call payload.
//!
//! Layout: 4-byte selector followed by two 32-byte big-endian words, the
//! round id and the answer (two's complement, sign-extended).

use crate::{Answer, RoundId, TypesError};

/// Selector of `submit(uint256,int256)`.
pub const SUBMIT_SELECTOR: [u8; 4] = [0x20, 0x2e, 0xe0, 0xed];

const WORD: usize = 32;

/// Encoded length of a submit call.
pub const SUBMIT_CALL_LEN: usize = SUBMIT_SELECTOR.len() + 2 * WORD;

/// A decoded `submit` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitCall {
    pub round_id: RoundId,
    pub answer: Answer,
}

impl SubmitCall {
    pub fn new(round_id: RoundId, answer: Answer) -> Self {
        Self { round_id, answer }
    }

    /// Encode into call data.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SUBMIT_CALL_LEN);
        out.extend_from_slice(&SUBMIT_SELECTOR);

        let mut round_word = [0u8; WORD];
        round_word[WORD - 8..].copy_from_slice(&self.round_id.to_be_bytes());
        out.extend_from_slice(&round_word);

        let fill = if self.answer < 0 { 0xff } else { 0x00 };
        let mut answer_word = [fill; WORD];
        answer_word[WORD - 16..].copy_from_slice(&self.answer.to_be_bytes());
        out.extend_from_slice(&answer_word);

        out
    }

    /// Decode call data produced by [`SubmitCall::encode`].
    ///
    /// # Errors
    ///
    /// - [`TypesError::InvalidCalldata`] on a wrong length or selector, or
    ///   when a word does not fit the native integer width
    pub fn decode(data: &[u8]) -> crate::Result<Self> {
        if data.len() != SUBMIT_CALL_LEN {
            return Err(TypesError::InvalidCalldata(format!(
                "expected {SUBMIT_CALL_LEN} bytes, got {}",
                data.len()
            )));
        }
        if data[..4] != SUBMIT_SELECTOR {
            return Err(TypesError::InvalidCalldata(format!(
                "unknown selector 0x{}",
                hex::encode(&data[..4])
            )));
        }

        let round_word = &data[4..4 + WORD];
        if round_word[..WORD - 8].iter().any(|b| *b != 0) {
            return Err(TypesError::InvalidCalldata("round id overflows u64".into()));
        }
        let mut round_bytes = [0u8; 8];
        round_bytes.copy_from_slice(&round_word[WORD - 8..]);

        let answer_word = &data[4 + WORD..];
        let mut answer_bytes = [0u8; 16];
        answer_bytes.copy_from_slice(&answer_word[WORD - 16..]);
        let answer = Answer::from_be_bytes(answer_bytes);
        let fill = if answer < 0 { 0xff } else { 0x00 };
        if answer_word[..WORD - 16].iter().any(|b| *b != fill) {
            return Err(TypesError::InvalidCalldata("answer overflows i128".into()));
        }

        Ok(Self {
            round_id: RoundId::from_be_bytes(round_bytes),
            answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let data = SubmitCall::new(1, 10).encode();
        assert_eq!(data.len(), SUBMIT_CALL_LEN);
        assert_eq!(&data[..4], &SUBMIT_SELECTOR);
        assert_eq!(data[4 + 31], 1);
        assert_eq!(data[4 + 32 + 31], 10);
    }

    #[test]
    fn test_negative_answer_sign_extended() {
        let data = SubmitCall::new(3, -1).encode();
        assert!(data[4 + 32..].iter().all(|b| *b == 0xff));
        let call = SubmitCall::decode(&data).expect("decode");
        assert_eq!(call, SubmitCall::new(3, -1));
    }

    #[test]
    fn test_decode_rejects_selector() {
        let mut data = SubmitCall::new(1, 10).encode();
        data[0] = 0;
        assert!(matches!(
            SubmitCall::decode(&data),
            Err(TypesError::InvalidCalldata(_))
        ));
    }

    #[test]
    fn test_decode_rejects_length() {
        assert!(matches!(
            SubmitCall::decode(&SUBMIT_SELECTOR),
            Err(TypesError::InvalidCalldata(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wide_round() {
        let mut data = SubmitCall::new(1, 10).encode();
        data[4] = 1;
        assert!(SubmitCall::decode(&data).is_err());
    }
}
