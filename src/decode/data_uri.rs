use base64::Engine;

pub(super) struct DataUri<'a> {
    pub mime_type: &'a str,
    base64: bool,
    data: &'a str,
}

impl<'a> DataUri<'a> {
    pub fn parse(uri: &'a str) -> Option<DataUri<'a>> {
        let uri = uri.strip_prefix("data:")?;
        let (mime_type, data) = uri.split_once(',')?;

        let (mime_type, base64) = match mime_type.strip_suffix(";base64") {
            Some(mime_type) => (mime_type, true),
            None => (mime_type, false),
        };

        Some(DataUri {
            mime_type,
            base64,
            data,
        })
    }

    /// Payload bytes; non-base64 payloads are percent-decoded.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        if self.base64 {
            base64::engine::general_purpose::STANDARD.decode(self.data)
        } else {
            Ok(percent_encoding::percent_decode_str(self.data).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_base64_buffer_uri_when_decoding_then_bytes_are_returned() {
        let uri = DataUri::parse("data:application/octet-stream;base64,AQID").expect("data uri");
        assert_eq!(uri.mime_type, "application/octet-stream");
        assert_eq!(uri.decode().expect("valid base64"), vec![1, 2, 3]);
    }

    #[test]
    fn given_percent_encoded_payload_when_decoding_then_escapes_are_resolved() {
        let uri = DataUri::parse("data:text/plain,a%20b").expect("data uri");
        assert_eq!(uri.decode().expect("plain payload"), b"a b".to_vec());
    }

    #[test]
    fn given_relative_path_when_parsing_then_it_is_not_a_data_uri() {
        assert!(DataUri::parse("model.bin").is_none());
    }
}
