/// Receives the response to a command sent with [`Transceiver::send`].
pub type ResponseCallback = Box<dyn FnOnce(Vec<u8>) + Send>;

/// Anything that accepts serialized TPM commands and returns serialized
/// responses: the device transport below the resource manager, and the
/// resource manager itself as seen from above.
pub trait Transceiver {
    /// Sends `command` and blocks until the matching response arrives.
    fn send_and_wait(&mut self, command: &[u8]) -> Vec<u8>;

    /// Sends `command` and hands the response to `callback`.
    fn send(&mut self, command: &[u8], callback: ResponseCallback) {
        let response = self.send_and_wait(command);
        callback(response);
    }

    /// One-time setup. Returns false if the transceiver is unusable.
    fn init(&mut self) -> bool {
        true
    }
}

impl<T: Transceiver + ?Sized> Transceiver for Box<T> {
    fn send_and_wait(&mut self, command: &[u8]) -> Vec<u8> {
        (**self).send_and_wait(command)
    }

    fn send(&mut self, command: &[u8], callback: ResponseCallback) {
        (**self).send(command, callback)
    }

    fn init(&mut self) -> bool {
        (**self).init()
    }
}
