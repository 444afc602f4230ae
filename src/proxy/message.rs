//! Frame conversion and close classification.
//!
//! The client side speaks axum's WebSocket message type, the backend side
//! speaks tungstenite's; the two are converted field-by-field so neither
//! library's version is exposed to the other.

use axum::extract::ws::{self, close_code, CloseFrame};
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::protocol::CloseFrame as TgCloseFrame;
use tokio_tungstenite::tungstenite::Message as TgMessage;

/// Convert a client frame into a backend frame.
pub(crate) fn into_backend_message(frame: ws::Message) -> TgMessage {
    match frame {
        ws::Message::Text(t) => TgMessage::Text(t.to_string().into()),
        ws::Message::Binary(b) => TgMessage::Binary(b.into()),
        ws::Message::Ping(p) => TgMessage::Ping(p.into()),
        ws::Message::Pong(p) => TgMessage::Pong(p.into()),
        ws::Message::Close(frame) => TgMessage::Close(frame.map(into_backend_close_frame)),
    }
}

/// Convert a backend frame into a client frame. Raw frames have no client
/// representation and are skipped.
pub(crate) fn into_client_message(frame: TgMessage) -> Option<ws::Message> {
    match frame {
        TgMessage::Text(t) => Some(ws::Message::Text(t.to_string().into())),
        TgMessage::Binary(b) => Some(ws::Message::Binary(b.into())),
        TgMessage::Ping(p) => Some(ws::Message::Ping(p.into())),
        TgMessage::Pong(p) => Some(ws::Message::Pong(p.into())),
        TgMessage::Close(frame) => Some(ws::Message::Close(frame.map(into_client_close_frame))),
        TgMessage::Frame(_) => None,
    }
}

fn into_backend_close_frame(frame: CloseFrame) -> TgCloseFrame {
    TgCloseFrame {
        code: frame.code.into(),
        reason: frame.reason.to_string().into(),
    }
}

fn into_client_close_frame(frame: TgCloseFrame) -> CloseFrame {
    CloseFrame {
        code: frame.code.into(),
        reason: frame.reason.to_string().into(),
    }
}

/// Whether a close frame from the client ends the whole session.
///
/// Normal closure, going-away, no-status and abnormal-closure all mean the
/// client is done; anything else is treated as a transport fault.
pub(crate) fn is_session_ending_close(frame: &Option<CloseFrame>) -> bool {
    match frame {
        None => true,
        Some(f) => matches!(
            f.code,
            close_code::NORMAL | close_code::AWAY | close_code::STATUS | close_code::ABNORMAL
        ),
    }
}

/// Whether a client read error means the peer vanished (reset, EOF without a
/// close handshake) rather than the transport misbehaving.
pub(crate) fn is_client_gone(err: &axum::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return true;
        }
        if let Some(ws_err) = cause.downcast_ref::<WsError>() {
            return matches!(
                ws_err,
                WsError::ConnectionClosed
                    | WsError::AlreadyClosed
                    | WsError::Io(_)
                    | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)
            );
        }
        source = cause.source();
    }
    false
}

/// Whether a client write failed only because the socket is already closed.
pub(crate) fn is_closed_send(err: &axum::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(ws_err) = cause.downcast_ref::<WsError>() {
            return matches!(
                ws_err,
                WsError::ConnectionClosed
                    | WsError::AlreadyClosed
                    | WsError::Protocol(ProtocolError::SendAfterClosing)
            );
        }
        source = cause.source();
    }
    false
}
