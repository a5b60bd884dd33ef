//! ハードウェア初期化モジュール
//!
//! クロック・PWM・エンコーダSPI・CANの初期化ロジックを集約します。

use embassy_stm32::{
    bind_interrupts, can,
    gpio::{Level, Output, OutputType, Speed},
    mode::Blocking,
    peripherals,
    spi::{self, Spi},
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
        Channel,
    },
    Config, Peri,
};
use embassy_time::Delay;
use minifoc::EncoderReader;

use crate::config;

// CANの割り込みをバインド
bind_interrupts!(pub struct Irqs {
    FDCAN1_IT0 => can::IT0InterruptHandler<peripherals::FDCAN1>;
    FDCAN1_IT1 => can::IT1InterruptHandler<peripherals::FDCAN1>;
});

/// SPI1 + CS(PA15) の磁気エンコーダ
pub type Encoder = EncoderReader<Spi<'static, Blocking>, Output<'static>, Delay>;

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{ClockMux, Fdcansel};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllQDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: Some(PllQDiv::DIV2), // FDCANクロック用
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R;

        let mut clock_mux = ClockMux::default();
        clock_mux.fdcansel = Fdcansel::PLL1_Q;
        config.rcc.mux = clock_mux;
    }
    config
}

/// エンコーダ初期化
///
/// SPI1: PB3=SCK、PB5=MOSI、PB4=MISO、PA15=CS（アクティブLow）
pub fn init_encoder(
    spi: Peri<'static, peripherals::SPI1>,
    sck: Peri<'static, peripherals::PB3>,
    mosi: Peri<'static, peripherals::PB5>,
    miso: Peri<'static, peripherals::PB4>,
    cs: Peri<'static, peripherals::PA15>,
) -> Encoder {
    let mut spi_config = spi::Config::default();
    spi_config.frequency = config::encoder::SPI_FREQUENCY;
    spi_config.mode = spi::MODE_1;

    let spi = Spi::new_blocking(spi, sck, mosi, miso, spi_config);
    let cs = Output::new(cs, Level::High, Speed::VeryHigh);
    info!("Encoder SPI initialized ({} Hz)", config::encoder::SPI_FREQUENCY.0);
    EncoderReader::new(spi, cs, Delay)
}

/// TIM1 3相相補PWM初期化
///
/// PE9/PE8=U、PE11/PE10=V、PE13/PE12=W。出力は0%で有効化されます。
pub fn init_pwm(
    tim: Peri<'static, peripherals::TIM1>,
    u: Peri<'static, peripherals::PE9>,
    un: Peri<'static, peripherals::PE8>,
    v: Peri<'static, peripherals::PE11>,
    vn: Peri<'static, peripherals::PE10>,
    w: Peri<'static, peripherals::PE13>,
    wn: Peri<'static, peripherals::PE12>,
) -> ComplementaryPwm<'static, peripherals::TIM1> {
    let mut pwm = ComplementaryPwm::new(
        tim,
        Some(PwmPin::new(u, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(un, OutputType::PushPull)),
        Some(PwmPin::new(v, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(vn, OutputType::PushPull)),
        Some(PwmPin::new(w, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(wn, OutputType::PushPull)),
        None,
        None,
        config::pwm::FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );
    pwm.disable(Channel::Ch1);
    pwm.disable(Channel::Ch2);
    pwm.disable(Channel::Ch3);
    pwm.set_dead_time(config::pwm::DEAD_TIME);
    pwm.set_duty(Channel::Ch1, 0);
    pwm.set_duty(Channel::Ch2, 0);
    pwm.set_duty(Channel::Ch3, 0);
    info!("PWM initialized: max duty={}", pwm.get_max_duty());
    pwm
}

/// FDCAN1初期化（PA11=RX、PA12=TX）
///
/// 標準IDを全てFIFO0に受け付け、コマンドIDの判定は受信タスクで行います。
pub fn init_can(
    fdcan: Peri<'static, peripherals::FDCAN1>,
    rx: Peri<'static, peripherals::PA11>,
    tx: Peri<'static, peripherals::PA12>,
) -> can::Can<'static> {
    let mut configurator = can::CanConfigurator::new(fdcan, rx, tx, Irqs);
    configurator.properties().set_standard_filter(
        can::filter::StandardFilterSlot::_0,
        can::filter::StandardFilter::accept_all_into_fifo0(),
    );
    configurator.set_bitrate(config::can::BITRATE);
    configurator.start(can::OperatingMode::NormalOperationMode)
}
