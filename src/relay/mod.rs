use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

pub mod msg;
use crate::exchange::Envelope;
use crate::relay::msg::Signal;

/// Constants
const RETRY_LIMIT: usize = 3;
const RETRY_DELAY_MS: u64 = 1000;
const POLL_TIMEOUT_MS: i64 = 10000;
const LINGER_PERIOD_MS: i32 = 10000;

/// The receiver accepts protocol envelopes pushed by remote producer
/// ranks, forwards each into the local exchange's inbox, and sends an Ack
/// back to the pushing peer.
pub mod receiver {

    use super::*;

    pub fn receiver<T>(port: u32, forward: Sender<Envelope<T>>, signal: Receiver<Signal>)
    where
        T: serde::de::DeserializeOwned,
    {
        let context = zmq::Context::new();
        let responder = context.socket(zmq::REP).unwrap();
        responder.set_rcvtimeo(POLL_TIMEOUT_MS as i32).unwrap();
        let addr = format!("tcp://*:{}", port);
        info!("Listening to {}", addr);
        assert!(responder.bind(&addr).is_ok());

        let mut message = zmq::Message::new();
        let mut rcv_count = 0;
        let mut ack_count = 0;
        loop {
            // Check for stop signal
            debug!("Check for signals");
            if let Ok(Signal::Stop) = signal.try_recv() {
                info!("Received shutdown signal");
                break;
            }

            debug!("Listen for envelope");
            match responder.recv(&mut message, 0) {
                Ok(()) => (),
                Err(_) => continue,
            }
            let req: msg::Request<T> = rmp_serde::decode::from_slice(&message).unwrap();
            rcv_count += 1;

            let id = req.id();
            match forward.send(req.into_envelope()) {
                Ok(_) => debug!("Forwarded envelope {} to the exchange", id),
                Err(fault) => error!("Failed to forward to exchange: {}", fault),
            }

            debug!("Sending Ack for {}", id);
            let response = msg::Response::new(msg::Status::Good(id));
            let mpk = rmp_serde::encode::to_vec(&response).unwrap();
            responder.send(&mpk, 0).unwrap();
            ack_count += 1;
            debug!("Ack Sent for {}", id);
        }
        info!("Stopping receiver thread");
        info!(
            "Received {} Envelopes. Acked {} Envelopes",
            rcv_count, ack_count
        );
    }
}

/// The sender connects to the rank owning the exchange and pushes each
/// envelope handed to it, retrying with a fresh socket when the peer fails
/// to Ack in time. An envelope is dropped after the retry limit; producers
/// deliver with at-least-once semantics and the accumulation protocol is
/// idempotent, so a duplicate push is always safe and a drop only delays
/// completion until the next producer round.
pub mod sender {

    use super::*;

    pub fn sender<T>(addr: String, outbound: Receiver<Envelope<T>>)
    where
        T: serde::Serialize,
    {
        info!("Connecting to {}...", addr);

        let context = zmq::Context::new();
        let mut requester = context.socket(zmq::REQ).unwrap();
        requester.set_linger(LINGER_PERIOD_MS).unwrap();
        debug!("New Socket: {:?}", requester.get_identity().unwrap());
        assert!(requester.connect(&addr).is_ok());

        let mut request_nbr = 0;
        let mut ack_count = 0;
        loop {
            request_nbr += 1;
            let env = match outbound.recv() {
                Ok(env) => env,
                Err(fault) => {
                    info!("Channel Disconnected: {}", fault);
                    break;
                }
            };

            debug!("Sending Envelope {}...", request_nbr);
            let request = msg::Request::new(request_nbr, env);
            let mpk = rmp_serde::encode::to_vec(&request).unwrap();

            let mut attempts = 0;
            loop {
                attempts += 1;

                if attempts > RETRY_LIMIT {
                    error!(
                        "Exceeded max retry limit ({}). Dropping envelope",
                        RETRY_LIMIT
                    );
                    break;
                } else if attempts > 1 {
                    warn!("Wait {}ms then retry...", RETRY_DELAY_MS);
                    thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }

                match requester.send(&mpk, 0) {
                    Ok(_) => (),
                    Err(fault) => {
                        info!("Send Error: {}", fault);
                        continue;
                    }
                }

                // Wait for peer to Ack the envelope
                debug!("Waiting for Ack for {}", request_nbr);
                match requester.poll(zmq::PollEvents::POLLIN, POLL_TIMEOUT_MS) {
                    Ok(i) => {
                        debug!("Polling #: {}", i);
                        if i > 0 {
                            let mut response = zmq::Message::new();
                            match requester.recv(&mut response, 0) {
                                Ok(_) => {
                                    let response: msg::Response =
                                        rmp_serde::decode::from_slice(&response).unwrap();
                                    match response.status() {
                                        msg::Status::Good(id) => {
                                            if id != request_nbr {
                                                warn!("Received Ack for wrong envelope.  Got {}, expected {}.", id, request_nbr);
                                            } else {
                                                ack_count += 1;
                                                debug!("Received Ack for {}", request_nbr);
                                            }
                                        }
                                        msg::Status::Bad => {
                                            warn!("Received Bad from peer");
                                        }
                                    }
                                    break;
                                }
                                Err(fault) => {
                                    panic!("Receive Error: {}", fault);
                                }
                            }
                        } else {
                            info!("Timeout.");
                            debug!("Dropping socket");
                            drop(requester);
                            debug!("Creating new socket");
                            requester = context.socket(zmq::REQ).unwrap();
                            requester.set_linger(LINGER_PERIOD_MS).unwrap();
                            assert!(requester.connect(&addr).is_ok());
                        }
                    }
                    Err(fault) => error!("Polling Error: {}", fault),
                }
            }
        }
        info!("Stopping sender thread");
        info!(
            "Sent {} Envelopes.  Received {} Acks",
            request_nbr, ack_count
        );
    }
}
