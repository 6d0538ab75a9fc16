use std::fmt;

/// Plastic categories the classifier was trained on.
///
/// Variant order is the order of the model's output vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlasticType {
    Pet,
    Hdpe,
    Ldpe,
    Pp,
    Ps,
    Other,
    NonPlastic,
}

impl PlasticType {
    pub const COUNT: usize = 7;

    pub const ALL: [PlasticType; PlasticType::COUNT] = [
        PlasticType::Pet,
        PlasticType::Hdpe,
        PlasticType::Ldpe,
        PlasticType::Pp,
        PlasticType::Ps,
        PlasticType::Other,
        PlasticType::NonPlastic,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            PlasticType::Pet => "PET",
            PlasticType::Hdpe => "HDPE",
            PlasticType::Ldpe => "LDPE",
            PlasticType::Pp => "PP",
            PlasticType::Ps => "PS",
            PlasticType::Other => "Lainnya",
            PlasticType::NonPlastic => "Non Plastik",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PlasticType::Pet => "Biasa digunakan untuk botol air mineral, jus, dan minuman ringan. Dapat didaur ulang menjadi serat untuk pakaian atau karpet.",
            PlasticType::Hdpe => "Digunakan untuk botol susu, botol deterjen, dan pipa. Dikenal kuat dan tahan terhadap bahan kimia. Dapat didaur ulang menjadi bangku taman atau pot tanaman.",
            PlasticType::Ldpe => "Ditemukan pada kantong plastik, plastik pembungkus (wrap), dan botol yang bisa diremas. Dapat didaur ulang menjadi kantong sampah.",
            PlasticType::Pp => "Digunakan untuk wadah makanan, tutup botol, dan komponen otomotif. Tahan panas. Dapat didaur ulang menjadi sikat atau baterai mobil.",
            PlasticType::Ps => "Dikenal sebagai styrofoam, digunakan untuk cangkir kopi sekali pakai dan kemasan makanan. Sulit didaur ulang.",
            PlasticType::Other => "Plastik jenis lain yang tidak termasuk dalam kategori di atas. Daur ulangnya bervariasi tergantung jenis dan komposisi.",
            PlasticType::NonPlastic => "Bukan plastik. Daur ulangnya tergantung pada jenis material.",
        }
    }
}

impl fmt::Display for PlasticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
