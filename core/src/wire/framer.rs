use super::{MessageHeader, MessageType, CTM_BYTES, MAX_MESSAGE_SEGMENTS, MESSAGE_HEADER_BYTES, PACKET_SIZE};
use crate::prelude::FrameError;
use std::borrow::Cow;

/// One logical message, reassembled from however many physical records
/// carried it.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    /// Header of the first segment.
    pub header: MessageHeader,
    /// Byte offset of the first segment in the input buffer.
    pub offset: usize,
    pub segments: u16,
    pub payload: Cow<'a, [u8]>,
}

impl Frame<'_> {
    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }
}

enum Record<'a> {
    Filler { advance: usize },
    Message {
        header: MessageHeader,
        body: &'a [u8],
        advance: usize,
    },
}

/// Splits a buffer into logical messages.
///
/// Iteration is lazy; each call to `next` consumes as many physical records as
/// the message at the cursor spans. A truncated record ends the iteration after
/// it is reported.
pub struct MessageFramer<'a> {
    data: &'a [u8],
    pos: usize,
    finished: bool,
}

impl<'a> MessageFramer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            finished: false,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn read_record(&self, at: usize) -> Result<Option<Record<'a>>, FrameError> {
        let remaining = self.data.len().saturating_sub(at);
        if remaining == 0 {
            return Ok(None);
        }
        let prefix = CTM_BYTES + MESSAGE_HEADER_BYTES;
        if remaining < prefix {
            if self.data[at..].iter().all(|&b| b == 0) {
                return Ok(None);
            }
            return Err(FrameError::Truncated {
                offset: at,
                expected_length: prefix,
                buffer_length: remaining,
            });
        }

        let header = MessageHeader::decode(&self.data[at + CTM_BYTES..at + prefix]).map_err(|_| {
            FrameError::Truncated {
                offset: at,
                expected_length: prefix,
                buffer_length: remaining,
            }
        })?;

        if header.is_filler() {
            return Ok(Some(Record::Filler {
                advance: PACKET_SIZE.min(remaining),
            }));
        }

        if MessageType::is_variable_length(header.message_type)
            && (header.message_len as usize) * 2 < MESSAGE_HEADER_BYTES
        {
            return Err(FrameError::BadLength {
                message_type: header.message_type,
                length: header.message_len,
                offset: at,
            });
        }

        let record_len = header.record_len();
        if record_len > remaining {
            return Err(FrameError::Truncated {
                offset: at,
                expected_length: record_len,
                buffer_length: remaining,
            });
        }

        let body_start = at + prefix;
        Ok(Some(Record::Message {
            header,
            body: &self.data[body_start..body_start + header.body_len()],
            advance: record_len,
        }))
    }

    fn reassemble(&mut self, first: MessageHeader, first_body: &'a [u8], offset: usize) -> Result<Frame<'a>, FrameError> {
        // A first segment reporting zero segments still has at least two; the
        // true count comes from segment 2.
        let quirk = first.num_message_segs == 0;
        let mut expected = if quirk { None } else { Some(first.num_message_segs) };
        if let Some(count) = expected {
            if count > MAX_MESSAGE_SEGMENTS {
                return Err(FrameError::SegmentCount {
                    message_type: first.message_type,
                    count,
                });
            }
        }

        let mut payload = first_body.to_vec();
        let mut last_seg = 1u16;
        let single = |body: &'a [u8]| Frame {
            header: first,
            offset,
            segments: 1,
            payload: Cow::Borrowed(body),
        };

        loop {
            if let Some(count) = expected {
                if last_seg >= count {
                    break;
                }
            }

            let record = match self.read_record(self.pos) {
                Ok(record) => record,
                Err(err) => {
                    self.finished = true;
                    return Err(err);
                }
            };

            let continues = match &record {
                Some(Record::Message { header, .. }) => {
                    header.message_type == first.message_type
                        && header.message_seg_num == last_seg + 1
                }
                _ => false,
            };

            if !continues {
                if quirk && last_seg == 1 {
                    log::debug!(
                        "message type {} at offset {} reported zero segments and has no continuation",
                        first.message_type,
                        offset
                    );
                    return Ok(single(first_body));
                }
                return Err(FrameError::BrokenChain {
                    message_type: first.message_type,
                    segment: last_seg,
                    count: expected.unwrap_or(0),
                });
            }

            if let Some(Record::Message {
                header,
                body,
                advance,
            }) = record
            {
                self.pos += advance;
                if expected.is_none() {
                    let count = header.num_message_segs;
                    if !(2..=MAX_MESSAGE_SEGMENTS).contains(&count) {
                        return Err(FrameError::SegmentCount {
                            message_type: first.message_type,
                            count,
                        });
                    }
                    expected = Some(count);
                }
                payload.extend_from_slice(body);
                last_seg = header.message_seg_num;
            }
        }

        let mut header = first;
        header.num_message_segs = last_seg;
        Ok(Frame {
            header,
            offset,
            segments: last_seg,
            payload: Cow::Owned(payload),
        })
    }
}

impl<'a> Iterator for MessageFramer<'a> {
    type Item = Result<Frame<'a>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            let start = self.pos;
            let record = match self.read_record(start) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            };

            let (header, body, advance) = match record {
                Record::Filler { advance } => {
                    self.pos += advance;
                    continue;
                }
                Record::Message {
                    header,
                    body,
                    advance,
                } => (header, body, advance),
            };
            self.pos += advance;

            if MessageType::from_u8(header.message_type).is_none() {
                return Some(Err(FrameError::UnknownType {
                    message_type: header.message_type,
                    offset: start,
                }));
            }

            let segs = header.num_message_segs;
            let seg = header.message_seg_num;
            if seg > 1 {
                return Some(Err(FrameError::OrphanSegment {
                    message_type: header.message_type,
                    segment: seg,
                    offset: start,
                }));
            }
            if segs <= 1 && !(segs == 0 && seg == 1) {
                return Some(Ok(Frame {
                    header,
                    offset: start,
                    segments: 1,
                    payload: Cow::Borrowed(body),
                }));
            }
            return Some(self.reassemble(header, body, start));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode::{write_filler, write_record, write_segmented, WireTime};
    use crate::wire::FIXED_BODY_BYTES;

    fn patch_segments(stream: &mut [u8], record_start: usize, num_segs: u16) {
        let at = record_start + CTM_BYTES + 12;
        stream[at..at + 2].copy_from_slice(&num_segs.to_be_bytes());
    }

    #[test]
    fn single_records_are_borrowed() {
        let mut stream = Vec::new();
        write_record(&mut stream, 2, &[1, 2, 3, 4], 1, 1, WireTime::default());
        write_record(&mut stream, 31, &[9; 10], 1, 1, WireTime::default());
        let frames: Vec<_> = MessageFramer::new(&stream).collect::<Result<_, _>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0].payload, Cow::Borrowed(_)));
        assert_eq!(&frames[0].payload[..], &[1, 2, 3, 4]);
        assert_eq!(frames[1].message_type(), 31);
        assert_eq!(frames[1].payload.len(), 10);
    }

    #[test]
    fn filler_records_are_skipped() {
        let mut stream = Vec::new();
        write_filler(&mut stream);
        write_record(&mut stream, 2, &[5; 40], 1, 1, WireTime::default());
        write_filler(&mut stream);
        let frames: Vec<_> = MessageFramer::new(&stream).collect::<Result<_, _>>().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].offset, PACKET_SIZE);
    }

    #[test]
    fn segments_are_concatenated() {
        let payload: Vec<u8> = (0..6000u32).map(|v| (v % 251) as u8).collect();
        let mut stream = Vec::new();
        write_segmented(&mut stream, 18, &payload, FIXED_BODY_BYTES, WireTime::default());
        write_record(&mut stream, 2, &[1; 40], 1, 1, WireTime::default());
        let frames: Vec<_> = MessageFramer::new(&stream).collect::<Result<_, _>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].segments, 3);
        assert_eq!(frames[0].payload.as_ref(), payload.as_slice());
        assert_eq!(frames[1].message_type(), 2);
    }

    #[test]
    fn zero_segment_count_on_first_segment_is_recovered() {
        let payload: Vec<u8> = (0..7000u32).map(|v| (v % 13) as u8).collect();
        let mut stream = Vec::new();
        write_segmented(&mut stream, 13, &payload, 2400, WireTime::default());
        write_record(&mut stream, 2, &[3; 40], 1, 1, WireTime::default());
        patch_segments(&mut stream, 0, 0);

        let frames: Vec<_> = MessageFramer::new(&stream).collect::<Result<_, _>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].segments, 3);
        assert_eq!(frames[0].payload.len(), payload.len());
        assert_eq!(frames[0].payload.as_ref(), payload.as_slice());
        assert_eq!(frames[1].message_type(), 2);
    }

    #[test]
    fn unknown_type_is_reported_and_skipped() {
        let mut stream = Vec::new();
        write_record(&mut stream, 99, &[0; 8], 1, 1, WireTime::default());
        write_record(&mut stream, 2, &[1; 40], 1, 1, WireTime::default());
        let results: Vec<_> = MessageFramer::new(&stream).collect();
        assert!(matches!(
            results[0],
            Err(FrameError::UnknownType { message_type: 99, .. })
        ));
        assert_eq!(results[1].as_ref().unwrap().message_type(), 2);
    }

    #[test]
    fn truncated_trailing_record_ends_iteration() {
        let mut stream = Vec::new();
        write_record(&mut stream, 2, &[1; 40], 1, 1, WireTime::default());
        write_record(&mut stream, 31, &[7; 200], 1, 1, WireTime::default());
        stream.truncate(stream.len() - 50);
        let results: Vec<_> = MessageFramer::new(&stream).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(FrameError::Truncated { .. })));
    }

    #[test]
    fn broken_chain_leaves_next_message_intact() {
        let payload = vec![4u8; 5000];
        let mut stream = Vec::new();
        let mut segmented = Vec::new();
        write_segmented(&mut segmented, 18, &payload, FIXED_BODY_BYTES, WireTime::default());
        stream.extend_from_slice(&segmented[..PACKET_SIZE]);
        write_record(&mut stream, 2, &[1; 40], 1, 1, WireTime::default());
        let results: Vec<_> = MessageFramer::new(&stream).collect();
        assert!(matches!(results[0], Err(FrameError::BrokenChain { segment: 1, .. })));
        assert_eq!(results[1].as_ref().unwrap().message_type(), 2);
    }

    #[test]
    fn implausible_segment_count_is_rejected() {
        let mut stream = Vec::new();
        write_record(&mut stream, 13, &[0; 40], 500, 1, WireTime::default());
        let results: Vec<_> = MessageFramer::new(&stream).collect();
        assert!(matches!(
            results[0],
            Err(FrameError::SegmentCount { count: 500, .. })
        ));
    }
}
