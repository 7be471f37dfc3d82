use serde::{Deserialize, Serialize};

use crate::exchange::Envelope;

pub enum Signal {
    Stop,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Request<T> {
    id: usize,
    env: Envelope<T>,
}

impl<T> Request<T> {
    pub fn new(id: usize, env: Envelope<T>) -> Request<T> {
        Request { id, env }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn into_envelope(self) -> Envelope<T> {
        self.env
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Response {
    status: Status,
}

impl Response {
    pub fn new(s: Status) -> Response {
        Response { status: s }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone)]
pub enum Status {
    Good(usize),
    Bad,
}
