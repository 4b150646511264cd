//! Event routing and presence fan-out.
//!
//! Every validated inbound event lands in [`dispatch`], which applies the
//! session state transition and derives the outbound notifications for the
//! affected rooms. Events from one connection are handled sequentially;
//! different connections dispatch concurrently against the shared registry.

use std::sync::Arc;

use courier_core::{ConnectionSession, TimerKey};
use courier_protocol::{ClientEvent, ServerEvent, UserRef};
use tracing::{debug, warn};

use crate::auth::AuthRequest;
use crate::handlers::AppState;
use crate::metrics;

/// Route one inbound event to its handler.
///
/// Handlers never fail the connection: validation already happened at
/// decode time, and anything that goes wrong here is reported to the
/// sender as a scoped `*_error` event or swallowed with a log line.
pub async fn dispatch(state: &Arc<AppState>, session: &mut ConnectionSession, event: ClientEvent) {
    if session.is_terminated() {
        debug!(connection = %session.id(), "dropping event for terminated session");
        return;
    }

    match event {
        ClientEvent::Authenticate {
            user_id,
            nickname,
            token,
        } => authenticate(state, session, user_id, nickname, token).await,
        ClientEvent::JoinChat { chat_id, user_id } => join_chat(state, session, chat_id, user_id),
        ClientEvent::LeaveChat { chat_id, user_id } => leave_chat(state, session, chat_id, user_id),
        ClientEvent::TypingStart {
            chat_id,
            user_id,
            nickname,
        } => typing_start(state, session, chat_id, user_id, nickname),
        ClientEvent::TypingStop { chat_id, user_id } => {
            typing_stop(state, session, chat_id, user_id);
        }
        ClientEvent::MessageReaction {
            message_id,
            chat_id,
            reaction,
            user_id,
        } => message_reaction(state, session, message_id, chat_id, reaction, user_id),
        ClientEvent::MessageRead {
            message_id,
            chat_id,
            user_id,
        } => message_read(state, session, message_id, chat_id, user_id),
        ClientEvent::PresenceUpdate {
            status,
            custom_message,
        } => presence_update(state, session, status, custom_message),
    }
}

/// Unwind a session after its transport closed.
///
/// Cancels every timer the connection owns, removes it from every joined
/// room with a room-scoped `user_offline`, then announces one global
/// `user_offline`. Runs to completion even when individual sends fail.
pub fn teardown(state: &Arc<AppState>, session: &mut ConnectionSession, reason: Option<String>) {
    if session.is_terminated() {
        return;
    }

    // Timers first: nothing may fire for a connection that has already
    // been removed from room membership.
    let cancelled = state.timers.cancel_all(session.id());
    let rooms = session.terminate();
    let identity = session.identity().cloned();

    for room in &rooms {
        state.registry.leave(room, session.id());
        if let Some(identity) = &identity {
            state.registry.broadcast(
                room,
                ServerEvent::user_offline(
                    identity.user_id.clone(),
                    identity.nickname.clone(),
                    Some(room.clone()),
                    reason.clone(),
                ),
                None,
            );
        }
    }

    state.registry.deregister(session.id());

    // Mirrors the global user_online on authenticate. An unauthenticated
    // session has no identity to announce.
    if let Some(identity) = &identity {
        state.registry.broadcast_all(
            ServerEvent::user_offline(
                identity.user_id.clone(),
                identity.nickname.clone(),
                None,
                reason,
            ),
            None,
        );
    }

    metrics::set_active_rooms(state.registry.room_count());
    debug!(
        connection = %session.id(),
        rooms = rooms.len(),
        timers = cancelled,
        "session terminated"
    );
}

async fn authenticate(
    state: &Arc<AppState>,
    session: &mut ConnectionSession,
    user_id: String,
    nickname: String,
    token: String,
) {
    let request = AuthRequest {
        user_id,
        nickname,
        token,
    };

    match state.verifier.verify(&request).await {
        Ok(identity) => {
            let user = UserRef::new(identity.user_id.clone(), identity.nickname.clone());
            session.authenticate(identity);

            state
                .registry
                .send_to(session.id(), ServerEvent::authenticated(user.clone()));
            state.registry.broadcast_all(
                ServerEvent::user_online(user.user_id, user.nickname),
                Some(session.id()),
            );
        }
        Err(e) => {
            debug!(connection = %session.id(), error = %e, "authentication failed");
            metrics::record_error("auth");
            state.registry.send_to(
                session.id(),
                ServerEvent::AuthError {
                    error: e.to_string(),
                },
            );
        }
    }
}

fn join_chat(state: &Arc<AppState>, session: &mut ConnectionSession, chat_id: String, user_id: String) {
    if !session.in_room(&chat_id)
        && session.room_count() >= state.config.limits.max_rooms_per_connection
    {
        state.registry.send_to(
            session.id(),
            ServerEvent::JoinChatError {
                error: "room limit reached".to_string(),
            },
        );
        return;
    }

    match state.registry.join(&chat_id, session.id().clone()) {
        Ok(participants) => {
            session.note_join(chat_id.clone());

            state.registry.send_to(
                session.id(),
                ServerEvent::chat_joined(chat_id.clone(), participants),
            );
            state.registry.broadcast(
                &chat_id,
                ServerEvent::user_joined_chat(user_id, session_nickname(session), chat_id.clone()),
                Some(session.id()),
            );
            metrics::set_active_rooms(state.registry.room_count());
        }
        Err(e) => {
            warn!(connection = %session.id(), error = %e, "join failed");
            metrics::record_error("join");
            state.registry.send_to(
                session.id(),
                ServerEvent::JoinChatError {
                    error: e.to_string(),
                },
            );
        }
    }
}

fn leave_chat(
    state: &Arc<AppState>,
    session: &mut ConnectionSession,
    chat_id: String,
    user_id: String,
) {
    // Cancel before removing membership: a stray expiry would otherwise
    // announce typing in a room the connection no longer belongs to.
    state
        .timers
        .cancel(&TimerKey::typing(session.id().clone(), chat_id.clone()));

    session.note_leave(&chat_id);
    state.registry.leave(&chat_id, session.id());

    state.registry.broadcast(
        &chat_id,
        ServerEvent::user_left_chat(user_id, session_nickname(session), chat_id.clone()),
        None,
    );
    metrics::set_active_rooms(state.registry.room_count());
}

fn typing_start(
    state: &Arc<AppState>,
    session: &mut ConnectionSession,
    chat_id: String,
    user_id: String,
    nickname: Option<String>,
) {
    let nickname = nickname.or_else(|| session_nickname(session));
    let key = TimerKey::typing(session.id().clone(), chat_id.clone());

    let expiry_state = Arc::clone(state);
    let expiry_connection = session.id().clone();
    let expiry_room = chat_id.clone();
    let expiry_user = user_id.clone();
    state
        .timers
        .schedule(key, state.config.typing.expiry(), move || {
            // The slot was removed atomically before this runs; membership
            // can still have changed between scheduling and expiry.
            if !expiry_state
                .registry
                .is_member(&expiry_room, &expiry_connection)
            {
                return;
            }
            expiry_state.registry.broadcast(
                &expiry_room,
                ServerEvent::user_stopped_typing(expiry_user, expiry_room.clone()),
                Some(&expiry_connection),
            );
        });

    state.registry.broadcast(
        &chat_id,
        ServerEvent::user_typing(user_id, nickname, chat_id.clone()),
        Some(session.id()),
    );
}

fn typing_stop(state: &Arc<AppState>, session: &ConnectionSession, chat_id: String, user_id: String) {
    state
        .timers
        .cancel(&TimerKey::typing(session.id().clone(), chat_id.clone()));

    // Stop is idempotent: announced even when no timer was pending.
    state.registry.broadcast(
        &chat_id,
        ServerEvent::user_stopped_typing(user_id, chat_id.clone()),
        Some(session.id()),
    );
}

fn message_reaction(
    state: &Arc<AppState>,
    session: &ConnectionSession,
    message_id: String,
    chat_id: String,
    reaction: String,
    user_id: String,
) {
    state.registry.broadcast(
        &chat_id,
        ServerEvent::message_reaction_added(
            message_id,
            chat_id.clone(),
            reaction,
            user_id,
            session_nickname(session),
        ),
        Some(session.id()),
    );
}

fn message_read(
    state: &Arc<AppState>,
    session: &ConnectionSession,
    message_id: String,
    chat_id: String,
    user_id: String,
) {
    // Read receipts go to the whole room, sender included.
    state.registry.broadcast(
        &chat_id,
        ServerEvent::message_read_status(message_id, chat_id.clone(), user_id),
        None,
    );
}

fn presence_update(
    state: &Arc<AppState>,
    session: &ConnectionSession,
    status: String,
    custom_message: Option<String>,
) {
    let Some(identity) = session.identity() else {
        state.registry.send_to(
            session.id(),
            ServerEvent::PresenceUpdateError {
                error: "authentication required".to_string(),
            },
        );
        return;
    };

    // Room-scoped on purpose: unlike online/offline, presence changes only
    // reach rooms the connection has joined.
    for room in session.joined_rooms() {
        state.registry.broadcast(
            room,
            ServerEvent::user_presence_changed(
                identity.user_id.clone(),
                identity.nickname.clone(),
                status.clone(),
                custom_message.clone(),
            ),
            Some(session.id()),
        );
    }
}

fn session_nickname(session: &ConnectionSession) -> Option<String> {
    session.identity().map(|i| i.nickname.clone())
}
