//! Messenger server library: the HTTP gateway in front of the messaging core

pub mod gateway;
